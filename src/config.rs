use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::camera::DEFAULT_HORIZONTAL_FOV_DEGREES;
use crate::detect::DetectorKind;
use crate::distance::DEFAULT_DEPTH_SCALE_CM;

const DEFAULT_API_ADDR: &str = "127.0.0.1:8790";
const DEFAULT_MODEL_INPUT: u32 = 640;

#[derive(Debug, Deserialize, Default)]
struct AssistConfigFile {
    api: Option<ApiConfigFile>,
    camera: Option<CameraConfigFile>,
    fusion: Option<FusionConfigFile>,
    selector: Option<SelectorConfigFile>,
    known_heights: Option<BTreeMap<String, f64>>,
    narrator: Option<NarratorConfigFile>,
    models: Option<ModelsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    horizontal_fov_degrees: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct FusionConfigFile {
    depth_scale_cm: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SelectorConfigFile {
    tie_break: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NarratorConfigFile {
    url: String,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelsConfigFile {
    general_path: String,
    general_classes: Vec<String>,
    specialized_path: String,
    specialized_classes: Vec<String>,
    depth_path: String,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AssistConfig {
    pub api_addr: String,
    pub camera: CameraSettings,
    pub fusion: FusionSettings,
    pub selector: SelectorSettings,
    /// Per-deployment entries merged over the built-in height table.
    pub known_heights: BTreeMap<String, f64>,
    pub narrator: Option<NarratorSettings>,
    pub models: Option<ModelSettings>,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub horizontal_fov_degrees: f64,
}

#[derive(Debug, Clone)]
pub struct FusionSettings {
    pub depth_scale_cm: f64,
}

#[derive(Debug, Clone)]
pub struct SelectorSettings {
    pub tie_break: DetectorKind,
}

#[derive(Debug, Clone)]
pub struct NarratorSettings {
    pub url: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub general_path: String,
    pub general_classes: Vec<String>,
    pub specialized_path: String,
    pub specialized_classes: Vec<String>,
    pub depth_path: String,
    pub input_width: u32,
    pub input_height: u32,
}

impl AssistConfig {
    /// Load from the file named by `NEARSIGHT_CONFIG` (if set), then apply
    /// environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("NEARSIGHT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AssistConfigFile) -> Result<Self> {
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let camera = CameraSettings {
            horizontal_fov_degrees: file
                .camera
                .and_then(|camera| camera.horizontal_fov_degrees)
                .unwrap_or(DEFAULT_HORIZONTAL_FOV_DEGREES),
        };
        let fusion = FusionSettings {
            depth_scale_cm: file
                .fusion
                .and_then(|fusion| fusion.depth_scale_cm)
                .unwrap_or(DEFAULT_DEPTH_SCALE_CM),
        };
        let selector = SelectorSettings {
            tie_break: match file.selector.and_then(|selector| selector.tie_break) {
                Some(value) => parse_tie_break(&value)?,
                None => DetectorKind::Specialized,
            },
        };
        let narrator = file.narrator.map(|narrator| NarratorSettings {
            url: narrator.url,
            timeout_secs: narrator.timeout_secs,
        });
        let models = file.models.map(|models| ModelSettings {
            general_path: models.general_path,
            general_classes: models.general_classes,
            specialized_path: models.specialized_path,
            specialized_classes: models.specialized_classes,
            depth_path: models.depth_path,
            input_width: models.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: models.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
        });
        Ok(Self {
            api_addr,
            camera,
            fusion,
            selector,
            known_heights: file.known_heights.unwrap_or_default(),
            narrator,
            models,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("NEARSIGHT_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(fov) = std::env::var("NEARSIGHT_FOV_DEGREES") {
            let degrees: f64 = fov
                .parse()
                .map_err(|_| anyhow!("NEARSIGHT_FOV_DEGREES must be a number of degrees"))?;
            self.camera.horizontal_fov_degrees = degrees;
        }
        if let Ok(scale) = std::env::var("NEARSIGHT_DEPTH_SCALE") {
            let scale_cm: f64 = scale
                .parse()
                .map_err(|_| anyhow!("NEARSIGHT_DEPTH_SCALE must be a number"))?;
            self.fusion.depth_scale_cm = scale_cm;
        }
        if let Ok(url) = std::env::var("NEARSIGHT_NARRATOR_URL") {
            if !url.trim().is_empty() {
                let timeout_secs = self.narrator.as_ref().and_then(|n| n.timeout_secs);
                self.narrator = Some(NarratorSettings { url, timeout_secs });
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(self.camera.horizontal_fov_degrees > 0.0
            && self.camera.horizontal_fov_degrees < 180.0)
        {
            return Err(anyhow!(
                "camera.horizontal_fov_degrees must be within (0, 180)"
            ));
        }
        if !(self.fusion.depth_scale_cm > 0.0 && self.fusion.depth_scale_cm.is_finite()) {
            return Err(anyhow!("fusion.depth_scale_cm must be positive"));
        }
        // Surface bad override entries at startup, not per request.
        crate::distance::KnownHeightTable::from_entries(
            self.known_heights.iter().map(|(k, v)| (k.as_str(), *v)),
        )?;
        if let Some(narrator) = &self.narrator {
            url::Url::parse(&narrator.url)
                .map_err(|e| anyhow!("invalid narrator.url '{}': {}", narrator.url, e))?;
        }
        if let Some(models) = &self.models {
            if models.input_width == 0 || models.input_height == 0 {
                return Err(anyhow!("models.input dimensions must be non-zero"));
            }
            if models.general_classes.is_empty() || models.specialized_classes.is_empty() {
                return Err(anyhow!("model class lists must not be empty"));
            }
        }
        Ok(())
    }
}

fn parse_tie_break(value: &str) -> Result<DetectorKind> {
    match value.trim().to_lowercase().as_str() {
        "specialized" => Ok(DetectorKind::Specialized),
        "general" => Ok(DetectorKind::General),
        other => Err(anyhow!(
            "selector.tie_break must be 'specialized' or 'general', got '{}'",
            other
        )),
    }
}

fn read_config_file(path: &Path) -> Result<AssistConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
