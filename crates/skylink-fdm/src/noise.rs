//! ---
//! sky_section: "02-flight-model"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Seeded bias and measurement noise for simulated sensors."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use rand::prelude::*;
use rand_distr::{Normal, NormalError};

use crate::aircraft::AircraftReadings;

/// A noise sample held constant between update instants.
#[derive(Debug, Clone)]
struct Channel {
    period: f64,
    offset: f64,
    distribution: Normal<f64>,
    value: f64,
    next_update: f64,
}

impl Channel {
    fn new(rate_hz: f64, offset: f64, mean: f64, sigma: f64) -> Result<Self, NormalError> {
        Ok(Self {
            period: 1.0 / rate_hz,
            offset,
            distribution: Normal::new(mean, sigma)?,
            value: offset,
            next_update: f64::NEG_INFINITY,
        })
    }

    fn refresh(&mut self, time: f64, rng: &mut StdRng) -> f64 {
        // A time earlier than the previous sample means the model was reset.
        if time >= self.next_update || time < self.next_update - self.period {
            self.value = self.offset + self.distribution.sample(rng);
            self.next_update = time + self.period;
        }
        self.value
    }
}

#[derive(Debug, Clone)]
struct Triad {
    x: Channel,
    y: Channel,
    z: Channel,
}

impl Triad {
    fn new(rate_hz: f64, bias: [f64; 3], mean: f64, sigma: f64) -> Result<Self, NormalError> {
        Ok(Self {
            x: Channel::new(rate_hz, bias[0], mean, sigma)?,
            y: Channel::new(rate_hz, bias[1], mean, sigma)?,
            z: Channel::new(rate_hz, bias[2], mean, sigma)?,
        })
    }

    fn refresh(&mut self, time: f64, rng: &mut StdRng) -> [f64; 3] {
        [
            self.x.refresh(time, rng),
            self.y.refresh(time, rng),
            self.z.refresh(time, rng),
        ]
    }
}

#[derive(Debug, Clone)]
struct InsChannels {
    roll: Channel,
    pitch: Channel,
    heading: Channel,
    latitude: Channel,
    longitude: Channel,
    airspeed: Channel,
    altitude: Channel,
}

/// Bias plus Gaussian measurement noise layered on the facade readings.
///
/// Accelerometer and gyroscope biases are drawn once at construction; every
/// other term is re-sampled when simulation time crosses the sensor's next
/// update instant. GPS, engine and control readings pass through untouched.
#[derive(Debug, Clone)]
pub struct SensorNoise {
    rng: StdRng,
    accelerometer: Triad,
    gyroscope: Triad,
    thermometer: Channel,
    static_pressure: Channel,
    pitot: Channel,
    ins: InsChannels,
}

impl SensorNoise {
    pub fn new(seed: u64) -> Result<Self, NormalError> {
        let mut rng = StdRng::seed_from_u64(seed);

        let accel_bias = Normal::new(-0.2, 0.02)?.sample(&mut rng);
        let gyro_bias = Normal::new(0.002, 0.0005)?;
        let gyro_biases = [
            gyro_bias.sample(&mut rng),
            gyro_bias.sample(&mut rng),
            gyro_bias.sample(&mut rng),
        ];

        let ins_rate = 5.0;
        Ok(Self {
            accelerometer: Triad::new(250.0, [accel_bias; 3], 0.06, 0.005)?,
            gyroscope: Triad::new(100.0, gyro_biases, 0.0, 0.00001)?,
            thermometer: Channel::new(50.0, 0.1, 0.0, 0.5)?,
            static_pressure: Channel::new(250.0, 100.0, 0.0, 10.0)?,
            pitot: Channel::new(250.0, 100.0, 0.0, 10.0)?,
            ins: InsChannels {
                roll: Channel::new(ins_rate, 0.0, 1.0, 0.5)?,
                pitch: Channel::new(ins_rate, 0.0, 0.7, 0.2)?,
                heading: Channel::new(ins_rate, 0.0, 2.1, 0.4)?,
                latitude: Channel::new(ins_rate, 0.0, 0.0001, 0.00005)?,
                longitude: Channel::new(ins_rate, 0.0, 0.0001, 0.00005)?,
                airspeed: Channel::new(ins_rate, 0.0, 3.0, 1.0)?,
                altitude: Channel::new(ins_rate, 0.0, 7.0, 3.0)?,
            },
            rng,
        })
    }

    pub fn apply(&mut self, readings: &mut AircraftReadings) {
        let t = readings.time;
        let rng = &mut self.rng;

        let [ax, ay, az] = self.accelerometer.refresh(t, rng);
        readings.accelerometer.x += ax;
        readings.accelerometer.y += ay;
        readings.accelerometer.z += az;

        let [p, q, r] = self.gyroscope.refresh(t, rng);
        readings.gyroscope.roll_rate += p;
        readings.gyroscope.pitch_rate += q;
        readings.gyroscope.yaw_rate += r;

        readings.temperature += self.thermometer.refresh(t, rng);
        readings.static_pressure += self.static_pressure.refresh(t, rng);
        readings.total_pressure += self.pitot.refresh(t, rng);

        let ins = &mut readings.ins;
        ins.roll += self.ins.roll.refresh(t, rng);
        ins.pitch += self.ins.pitch.refresh(t, rng);
        ins.heading += self.ins.heading.refresh(t, rng);
        ins.latitude += self.ins.latitude.refresh(t, rng);
        ins.longitude += self.ins.longitude.refresh(t, rng);
        ins.airspeed += self.ins.airspeed.refresh(t, rng);
        ins.altitude += self.ins.altitude.refresh(t, rng);
    }
}
