use serde::{Deserialize, Serialize};

// Parameters that define a tornado. Only the active count and randomness may be
// changed after construction.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct TornadoParams {
    pub max_particles: u32,
    pub num_active_particles: u32,
    pub particle_randomness: f32,

    // Animate p0 and p3 around their own circles.
    pub animated_control_points: bool,
    // When disabled the whole capacity is always simulated.
    pub capacity_limiting: bool,

    // Fixed seed for the initial particle distribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default)]
    pub program: ProgramParams,

    #[serde(default)]
    pub curve: CurveParams,
}

// Static uniforms of the update program, set once at load.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ProgramParams {
    pub rotation_radius: f32,
    pub rotational_velocity: f32,
    pub parametric_velocity: f32,
}

impl Default for ProgramParams {
    fn default() -> Self {
        ProgramParams {
            rotation_radius: 2.0,
            rotational_velocity: 10.0,
            parametric_velocity: 0.2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CurveParams {
    pub p0: [f32; 3],
    pub p1: [f32; 3],
    pub p2: [f32; 3],
    pub p3: [f32; 3],

    #[serde(default = "MotionParams::default_p0")]
    pub p0_motion: MotionParams,

    #[serde(default = "MotionParams::default_p3")]
    pub p3_motion: MotionParams,
}

impl Default for CurveParams {
    fn default() -> Self {
        CurveParams {
            p0: [0.0, -18.0, -50.0],
            p1: [4.0, -10.0, -50.0],
            p2: [-3.0, 2.0, -10.0],
            p3: [0.0, 8.0, -10.0],
            p0_motion: MotionParams::default_p0(),
            p3_motion: MotionParams::default_p3(),
        }
    }
}

// Circular path of an animated end point. The configured point is the center
// of rotation; radius and speed are scaled by the particle randomness.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MotionParams {
    pub radius: f32,
    pub rotation_speed: f32,
    #[serde(default)]
    pub initial_angle: f32,
}

impl MotionParams {
    fn default_p0() -> Self {
        MotionParams {
            radius: 3.0,
            rotation_speed: 0.6,
            initial_angle: 0.0,
        }
    }

    fn default_p3() -> Self {
        MotionParams {
            radius: 5.0,
            rotation_speed: 1.0,
            initial_angle: std::f32::consts::PI,
        }
    }
}

impl std::str::FromStr for TornadoParams {
    type Err = toml::de::Error;
    fn from_str(serialized: &str) -> Result<Self, Self::Err> {
        let params = toml::from_str(serialized)?;
        Ok(params)
    }
}

impl Default for TornadoParams {
    fn default() -> Self {
        TornadoParams {
            max_particles: 1 << 18,
            num_active_particles: 1 << 17,
            particle_randomness: 0.3,
            animated_control_points: true,
            capacity_limiting: true,
            seed: None,
            program: ProgramParams::default(),
            curve: CurveParams::default(),
        }
    }
}

pub fn read_config_from_file(path: &str) -> anyhow::Result<TornadoParams> {
    let params = std::fs::read_to_string(path)?.parse()?;
    Ok(params)
}

pub fn get_config_from_default_file() -> TornadoParams {
    let config_data = include_str!("../tornado_config.toml");
    match config_data.parse() {
        Ok(params) => params,
        Err(e) => {
            log::error!(
                "Failed to parse config file({}): {:?}",
                "../tornado_config.toml",
                e
            );
            TornadoParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke() {
        let params = TornadoParams {
            max_particles: 100,
            num_active_particles: 10,
            particle_randomness: 0.0,
            animated_control_points: false,
            capacity_limiting: true,
            seed: Some(7),
            program: ProgramParams::default(),
            curve: CurveParams::default(),
        };
        let serialized = toml::to_string(&params).unwrap();
        println!("serialized = {}", serialized);
        let deserialized: TornadoParams = toml::from_str(&serialized).unwrap();
        println!("deserialized = {:?}", deserialized);
        assert_eq!(params, deserialized);
    }

    #[test]
    fn default_file_parses() {
        let from_file: TornadoParams = include_str!("../tornado_config.toml").parse().unwrap();
        assert_eq!(from_file.max_particles, 262144);
        assert!(from_file.num_active_particles <= from_file.max_particles);
        assert_eq!(from_file.program, ProgramParams::default());
        assert_eq!(from_file.curve.p0, CurveParams::default().p0);
        assert_eq!(get_config_from_default_file(), from_file);
    }

    #[test]
    fn missing_tables_use_defaults() {
        let params: TornadoParams = "max_particles = 8\n\
                                     num_active_particles = 4\n\
                                     particle_randomness = 1.5\n\
                                     animated_control_points = true\n\
                                     capacity_limiting = false\n"
            .parse()
            .unwrap();
        assert_eq!(params.seed, None);
        assert_eq!(params.program, ProgramParams::default());
        assert_eq!(params.curve, CurveParams::default());
        assert_eq!(params.particle_randomness, 1.5);
    }
}
