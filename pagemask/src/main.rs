#![warn(clippy::pedantic)]

use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use pagemask::{
    assembly::PdfAssembler,
    cli::{Args, USAGE},
    session::{LayerId, OverlaySession},
    settings::Settings,
    sources::{to_rgba_image, ImageDocument, PageNumber, PageRef, SourceLibrary},
};
use pagemask_core::{units::Resolution, MaskBuffer};

fn main() -> AnyResult<()> {
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    if has_term {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        let _ = simple_logging::log_to_file("log.out", log::LevelFilter::Debug);
    }

    let args = match Args::parse(std::env::args_os().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            std::process::exit(2);
        }
    };
    let settings = Settings::load();
    if args.save_settings {
        if let Err(e) = settings.save() {
            log::warn!("Failed to save settings: {e:#}");
        }
    }

    // Rasterization is the only thing awaited, a single thread plus the blocking pool suffices.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("building runtime")?;
    runtime.block_on(run(args, settings))
}

fn open_source(
    library: &SourceLibrary,
    path: &std::path::Path,
    resolution: Resolution,
) -> AnyResult<PageRef> {
    let document = ImageDocument::open(&[path], resolution)
        .with_context(|| format!("opening {}", path.display()))?;
    let id = library.insert(Arc::new(document));
    library
        .page(id, PageNumber::FIRST)
        .context("document vanished")?
        .with_context(|| format!("first page of {}", path.display()))
}

fn load_mask(path: &std::path::Path) -> AnyResult<MaskBuffer> {
    let luma = image::open(path)
        .with_context(|| format!("opening mask {}", path.display()))?
        .into_luma8();
    let (width, height) = luma.dimensions();
    Ok(MaskBuffer::from_luma(width, height, luma.into_raw())?)
}

async fn run(args: Args, settings: Settings) -> AnyResult<()> {
    let mut config = settings.session_config().context("invalid settings")?;
    if let Some(opacity) = args.opacity {
        config.preview_opacity = opacity;
    }
    let resolution = settings.source_resolution()?;

    let library = SourceLibrary::default();
    let bottom = open_source(&library, &args.bottom, resolution)?;
    let top = open_source(&library, &args.top, resolution)?;

    let mut session = OverlaySession::new(config, Arc::new(PdfAssembler));
    session
        .select_layer_page(LayerId::Bottom, bottom)
        .await
        .context("rasterizing bottom layer")?;
    session
        .select_layer_page(LayerId::Top, top)
        .await
        .context("rasterizing top layer")?;

    if let Some(mask_path) = &args.mask {
        let mask = load_mask(mask_path)?;
        session.import_mask(&mask)?;
    }

    if let Some(preview_path) = &args.preview {
        let preview = session
            .displayed()
            .context("nothing to preview")?
            .image();
        to_rgba_image(preview)
            .save(preview_path)
            .with_context(|| format!("writing preview {}", preview_path.display()))?;
        log::info!("Wrote preview to {}", preview_path.display());
    }

    let output = args
        .output
        .unwrap_or_else(|| settings.output_file_name.clone().into());
    let bytes = session.export_final().await.context("exporting")?;
    std::fs::write(&output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    log::info!(
        "Wrote {} to {}",
        human_bytes::human_bytes(bytes.len() as f64),
        output.display()
    );
    Ok(())
}
