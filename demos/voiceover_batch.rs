//! Пример пакетной работы с библиотекой voiceover-sync
//!
//! ```text
//! cargo run --example voiceover_batch -- balance
//! cargo run --example voiceover_batch -- lines script.txt
//! cargo run --example voiceover_batch -- full script.txt
//! cargo run --example voiceover_batch -- merge videos/ output_audio/
//! cargo run --example voiceover_batch -- montage output_video/ final.mp4
//! cargo run --example voiceover_batch -- audit videos/ images/ report/
//! ```
//!
//! Конфигурация читается из файла `VOICESYNC_CONFIG` (JSON), ключ API можно
//! передать через `VOICE_API_KEY`. Ctrl+C останавливает пакет после текущей
//! строки или пары.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use voiceover_sync::config::{SynthesisMode, VoiceSyncConfig};
use voiceover_sync::notification::ConsoleProgressObserver;
use voiceover_sync::{logger, VoiceSync};

fn load_config() -> Result<VoiceSyncConfig> {
    let mut config = match std::env::var("VOICESYNC_CONFIG") {
        Ok(path) => VoiceSyncConfig::from_json_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        Err(_) => VoiceSyncConfig::default(),
    };
    if let Ok(key) = std::env::var("VOICE_API_KEY") {
        config.api.api_key = key;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let voice_sync = VoiceSync::new(load_config()?);
    voice_sync.add_observer(Box::new(ConsoleProgressObserver::with_prefix("voiceover")));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Stopping after the current item...");
            on_ctrl_c.cancel();
        }
    });

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["balance"] => {
            let balance = voice_sync.check_balance().await?;
            println!("Balance: {}", balance.display());
            for template in voice_sync.list_templates().await? {
                println!("{}  {}", template.uuid, template.name);
            }
        }
        [mode @ ("lines" | "full"), script] => {
            let text = std::fs::read_to_string(script).with_context(|| format!("failed to read {}", script))?;
            let mode = if *mode == "lines" {
                SynthesisMode::LineByLine
            } else {
                SynthesisMode::FullText
            };
            let report = voice_sync.synthesize(&text, mode, &cancel).await?;
            println!("{}", report.summary.headline());
            if !report.summary.failures.is_empty() {
                println!("{}", report.summary.failure_digest());
            }
        }
        ["merge", video_dir, audio_dir] => {
            let summary = voice_sync
                .merge_directory(Path::new(video_dir), Path::new(audio_dir), &cancel)
                .await?;
            println!("{}", summary.headline());
            if !summary.failures.is_empty() {
                println!("{}", summary.failure_digest());
            }
        }
        ["montage", dir, output] => {
            let path = voice_sync.montage(Path::new(dir), Path::new(output)).await?;
            println!("Montage saved to {}", path.display());
        }
        ["audit", video_dir, image_dir, report_dir] => {
            let report = voice_sync.audit(Path::new(video_dir), Path::new(image_dir), Path::new(report_dir))?;
            println!(
                "Images: {}, videos: {}, missing: {:?} ({:.1}% complete)",
                report.image_count,
                report.video_count,
                report.missing,
                report.success_rate()
            );
        }
        _ => bail!("usage: voiceover_batch balance | lines <file> | full <file> | merge <videos> <audio> | montage <dir> <out> | audit <videos> <images> <report>"),
    }

    Ok(())
}
