use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vision_reader::app::{App, ImageInput, UploadMode};
use vision_reader::models::{Config, GenerationConfig, PromptSpec};
use vision_reader::prompts;

#[derive(Debug, Parser)]
#[command(name = "vision-reader")]
#[command(about = "Extract text from images with the Gemini API")]
struct CliArgs {
    /// Image files to describe, processed in order.
    #[arg(value_name = "IMAGE", required_unless_present = "base64")]
    images: Vec<PathBuf>,

    /// Base64-encoded image data instead of a file.
    #[arg(long, conflicts_with = "images", requires = "mime_type")]
    base64: Option<String>,

    /// MIME type of the --base64 data, e.g. image/png.
    #[arg(long)]
    mime_type: Option<String>,

    /// Prompt sent alongside the image.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Custom system instruction.
    #[arg(long)]
    system: Option<String>,

    /// Speech-friendly output: bundled system instruction and sampling preset.
    #[arg(long)]
    tts: bool,

    /// When to go through the file upload service instead of inlining.
    #[arg(long, value_enum, default_value_t = UploadMode::Auto)]
    upload: UploadMode,

    /// Model ID, overrides GEMINI_MODEL.
    #[arg(long)]
    model: Option<String>,

    /// Request timeout in seconds, overrides GEMINI_TIMEOUT_SECS.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    top_k: Option<u32>,

    #[arg(long)]
    top_p: Option<f64>,

    #[arg(long)]
    max_output_tokens: Option<u32>,

    /// Expected format of the returned text, e.g. text/plain.
    #[arg(long)]
    response_mime_type: Option<String>,
}

impl CliArgs {
    /// Explicit flags win over the `--tts` preset.
    fn prompt_spec(&self) -> vision_reader::Result<PromptSpec> {
        let base = if self.tts {
            PromptSpec::tts()
        } else {
            PromptSpec::describe()
        };
        let preset = base.generation_config().clone();

        let generation_config = GenerationConfig {
            temperature: self.temperature.or(preset.temperature),
            top_k: self.top_k.or(preset.top_k),
            top_p: self.top_p.or(preset.top_p),
            max_output_tokens: self.max_output_tokens.or(preset.max_output_tokens),
            response_mime_type: self
                .response_mime_type
                .clone()
                .or(preset.response_mime_type),
        };

        PromptSpec::new(
            self.prompt
                .clone()
                .unwrap_or_else(|| prompts::trimmed(prompts::DESCRIBE_USER)),
            self.system
                .clone()
                .or_else(|| base.system_instruction().map(str::to_string)),
            generation_config,
        )
    }

    fn inputs(&self) -> vision_reader::Result<Vec<ImageInput>> {
        match (&self.base64, &self.mime_type) {
            (Some(data), Some(mime)) => Ok(vec![ImageInput::from_base64(data, mime)?]),
            _ => self
                .images
                .iter()
                .map(|path| ImageInput::from_path(path))
                .collect(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vision_reader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }

    let prompt = args.prompt_spec()?;
    let inputs = args.inputs()?;
    let app = App::new(&config, prompt, args.upload);

    info!("Starting vision-reader for {} image(s)", inputs.len());

    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr();

    // Dropping the batch future on Ctrl-C aborts the in-flight request.
    let summary = tokio::select! {
        summary = app.run(&inputs, &mut stdout, &mut stderr) => summary?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling outstanding request");
            bail!("interrupted");
        }
    };

    if !summary.is_success() {
        bail!(
            "{} of {} image(s) failed",
            summary.failed,
            summary.succeeded + summary.failed
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("vision-reader").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_requires_image_or_base64() {
        assert!(CliArgs::try_parse_from(["vision-reader"]).is_err());
    }

    #[test]
    fn test_base64_requires_mime_type() {
        assert!(CliArgs::try_parse_from(["vision-reader", "--base64", "AAEC"]).is_err());
    }

    #[test]
    fn test_default_prompt_has_no_tuning() {
        let spec = parse(&["page.png"]).prompt_spec().unwrap();
        assert_eq!(spec.user_prompt(), "Describe the content of this image.");
        assert_eq!(spec.system_instruction(), None);
        assert!(spec.generation_config().is_empty());
    }

    #[test]
    fn test_tts_flag_applies_preset_with_overrides() {
        let spec = parse(&["page.png", "--tts", "--temperature", "0.3", "-p", "Read this page"])
            .prompt_spec()
            .unwrap();
        assert_eq!(spec.user_prompt(), "Read this page");
        assert!(spec.system_instruction().is_some());
        assert_eq!(spec.generation_config().temperature, Some(0.3));
        assert_eq!(spec.generation_config().top_k, Some(40));
    }

    #[test]
    fn test_out_of_range_temperature_is_rejected() {
        assert!(parse(&["page.png", "--temperature", "3"])
            .prompt_spec()
            .is_err());
    }

    #[test]
    fn test_upload_mode_parses() {
        assert_eq!(parse(&["a.png", "--upload", "always"]).upload, UploadMode::Always);
        assert_eq!(parse(&["a.png"]).upload, UploadMode::Auto);
    }

    #[test]
    fn test_base64_input() {
        let args = parse(&["--base64", "iVBORw==", "--mime-type", "image/png"]);
        let inputs = args.inputs().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].payload.bytes(), &[0x89, 0x50, 0x4E, 0x47]);
    }
}
