use std::path::Path;
use std::sync::Arc;

use ab_glyph::FontArc;
use anyhow::{anyhow, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vision_overlay::config::Config;
use vision_overlay::server::{self, AppState};
use vision_overlay::{Renderer, SafetyTipRules};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(cfg!(debug_assertions))
        .init();
}

fn load_font(path: &Path) -> anyhow::Result<FontArc> {
    let data = std::fs::read(path)
        .with_context(|| format!("cannot read font file {}", path.display()))?;
    FontArc::try_from_vec(data)
        .map_err(|err| anyhow!("unable to parse font data in {}: {err}", path.display()))
}

fn load_safety_tips(path: &Path) -> anyhow::Result<SafetyTipRules> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read safety tips file {}", path.display()))?;
    SafetyTipRules::from_json(&json)
        .with_context(|| format!("invalid safety tips in {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;

    let renderer = match &config.font_path {
        Some(path) => {
            let font = load_font(path)?;
            info!(path = %path.display(), "loaded label font");
            Renderer::new().with_font(font)
        }
        None => {
            let renderer = Renderer::new();
            if renderer.has_font() {
                info!("using the bundled label font");
            }
            renderer
        }
    };

    let safety_tips = match &config.safety_tips_path {
        Some(path) => load_safety_tips(path)?,
        None => SafetyTipRules::default(),
    };
    info!(rules = safety_tips.len(), "safety tips ready");

    if config.vision.is_none() {
        warn!("AZURE_VISION_ENDPOINT/AZURE_VISION_KEY not set; /analyze needs per-request keys");
    }

    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(config, renderer, safety_tips));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("cannot bind {bind_addr}"))?;

    info!("server running on http://{bind_addr}");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
