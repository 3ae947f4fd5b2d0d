use clu_core::{config::Config, settings::SettingSchema};

#[tokio::main]
async fn main() -> Result<(), clu_core::Error> {
    clu_core::logging::init("clu")?;

    let cfg = Config::load()?;
    let schema = SettingSchema::load_file(&cfg.settings_schema_path)?;
    tracing::info!(
        settings = schema.len(),
        channel = %cfg.settings_channel,
        "loaded settings schema"
    );

    clu_discord::run(&cfg, schema)
        .await
        .map_err(|e| clu_core::Error::platform("discord", format!("bot failed: {e:#}")))?;

    Ok(())
}
