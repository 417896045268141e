// finetune-rs/src/bin/retrain.rs
// Offline batch job: aggregate accumulated feedback, merge with the
// curated base corpus, and run one parameter-efficient fine-tuning pass.
// Separate from the serving process; intended to be run from cron or by
// an operator.

use std::path::PathBuf;

use config_rs::Settings;
use feedback::queue_from_settings;
use finetune::backend::HttpTrainingBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env();

    let queue = queue_from_settings(&settings).await?;
    let backend = HttpTrainingBackend::new(&settings.trainer_api_url, settings.llm_timeout_secs);
    let curated_base_path = PathBuf::from(&settings.curated_base_path);

    match finetune::pipeline::run(
        &settings.model_text2sql_id,
        queue.as_ref(),
        &backend,
        &curated_base_path,
    )
    .await?
    {
        Some(version_tag) => log::info!("Fine-tuning run complete: {}", version_tag),
        None => log::info!("Nothing to train on; exiting."),
    }

    Ok(())
}
