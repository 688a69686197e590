//! Local proxy-engine management: config translation and process supervision.

pub mod config;
pub mod supervisor;

pub use config::{sing_box_config, v2ray_config, SingBoxConfig, V2rayConfig};
pub use supervisor::{EngineKind, EngineProcess, EngineSupervisor};
