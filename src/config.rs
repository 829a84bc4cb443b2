use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Program plus arguments; stdout must be a stream of binary PPM frames.
    pub command: Option<Vec<String>>,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub gemini: GeminiConfig,
    pub camera: CameraConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let gemini = GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY")
                .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY is not set"))?,
            model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-3-flash-preview".into()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into()),
            temperature: std::env::var("ANALYSIS_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.3),
        };
        let camera = CameraConfig {
            command: std::env::var("CAMERA_COMMAND")
                .ok()
                .and_then(|v| parse_command(&v)),
            jpeg_quality: std::env::var("JPEG_QUALITY")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .map(|q| q.clamp(1, 100) as u8)
                .unwrap_or(80),
        };
        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".mealsnap"));
        Ok(Self {
            data_dir,
            gemini,
            camera,
        })
    }
}

fn parse_command(raw: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

#[cfg(test)]
mod config_tests {
    use super::parse_command;

    #[test]
    fn camera_command_is_split_on_whitespace() {
        let cmd = parse_command("ffmpeg -f v4l2  -i /dev/video0").unwrap();
        assert_eq!(cmd, vec!["ffmpeg", "-f", "v4l2", "-i", "/dev/video0"]);
    }

    #[test]
    fn blank_camera_command_means_no_camera() {
        assert!(parse_command("   ").is_none());
        assert!(parse_command("").is_none());
    }
}
