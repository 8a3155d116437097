//! ---
//! sky_section: "02-flight-model"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Flight-dynamics adapter contract and aircraft facade."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---

const METERS_PER_FOOT: f64 = 0.3048;
const MPS_PER_KNOT: f64 = 0.514444;
const PASCAL_PER_PSF: f64 = 47.8802588889;
const NEWTONS_PER_POUND: f64 = 4.44822162;

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * METERS_PER_FOOT
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters / METERS_PER_FOOT
}

pub fn knots_to_meters_per_sec(knots: f64) -> f64 {
    knots * MPS_PER_KNOT
}

pub fn meters_per_sec_to_knots(mps: f64) -> f64 {
    mps / MPS_PER_KNOT
}

pub fn rankine_to_kelvin(rankine: f64) -> f64 {
    rankine * (5.0 / 9.0)
}

pub fn kelvin_to_rankine(kelvin: f64) -> f64 {
    kelvin * (9.0 / 5.0)
}

pub fn psf_to_pascal(psf: f64) -> f64 {
    psf * PASCAL_PER_PSF
}

pub fn pascal_to_psf(pascal: f64) -> f64 {
    pascal / PASCAL_PER_PSF
}

pub fn pounds_to_newtons(pounds: f64) -> f64 {
    pounds * NEWTONS_PER_POUND
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn conversions_match_reference_values() {
        assert!(close(feet_to_meters(1000.0), 304.8));
        assert!(close(knots_to_meters_per_sec(100.0), 51.4444));
        assert!(close(rankine_to_kelvin(518.67), 288.15));
        assert!(close(psf_to_pascal(2.0), 95.7605177778));
        assert!(close(pounds_to_newtons(10.0), 44.4822162));
    }

    #[test]
    fn inverse_conversions_cancel() {
        assert!(close(meters_to_feet(feet_to_meters(1234.5)), 1234.5));
        assert!(close(meters_per_sec_to_knots(knots_to_meters_per_sec(87.0)), 87.0));
        assert!(close(kelvin_to_rankine(rankine_to_kelvin(500.0)), 500.0));
        assert!(close(pascal_to_psf(psf_to_pascal(2000.0)), 2000.0));
    }
}
