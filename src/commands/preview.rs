use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use medgif::preview::encode_png_rgb;
use medgif::{PreviewRequest, PreviewSettings, SliceRange, TransformSpec, pipeline};
use serde_json::json;

use super::{InputArgs, RenderArgs, SliceArgs};

#[derive(Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub slicing: SliceArgs,

    /// Longer side of the preview frames in pixels
    #[arg(long, default_value = "256")]
    pub preview_size: u32,

    /// Also write colour frames rendered with the options below
    #[arg(long)]
    pub rendered: bool,

    #[command(flatten)]
    pub render: RenderArgs,

    /// Output directory
    #[arg(short, long, default_value = "preview")]
    pub output: PathBuf,
}

impl PreviewArgs {
    fn request(&self) -> PreviewRequest {
        let slicing = &self.slicing;
        PreviewRequest {
            mode: slicing.mode.into(),
            orientation: slicing.orientation.into(),
            window_mode: slicing.window_mode.into(),
            window_width: slicing.window_width,
            window_level: slicing.window_level,
            preview_size: self.preview_size,
            sort_by: self.input.sort_by.into(),
            slice_index: slicing.slice_index,
            correct_aspect: !slicing.no_aspect_correction,
        }
    }

    fn settings(&self) -> PreviewSettings {
        let render = &self.render;
        let start = render.slice_start.min(100);
        let end = render.slice_end.min(100).max((start + 1).min(100));
        PreviewSettings {
            colormap: render.colormap.into(),
            range: SliceRange::new(start, end),
            transform: TransformSpec {
                flip_horizontal: render.flip_horizontal,
                flip_vertical: render.flip_vertical,
                rotate90: render.rotate90.rem_euclid(4) as u8,
                reverse_slices: render.reverse_slices,
            },
        }
    }
}

pub fn run(args: &PreviewArgs) -> Result<()> {
    let limits = args.input.limits()?;
    let files = args.input.read_files()?;

    let payload =
        pipeline::preview(&files, args.request(), &limits).context("Preview failed")?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    for (i, png) in payload.frames_png()?.iter().enumerate() {
        let path = args.output.join(format!("frame_{i:04}.png"));
        std::fs::write(&path, png)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let mut rendered = 0;
    if args.rendered {
        let renderer = payload.renderer(args.settings())?;
        for position in 0..renderer.len() {
            let png = encode_png_rgb(&renderer.render(position)?)?;
            let path = args.output.join(format!("rendered_{position:04}.png"));
            std::fs::write(&path, png)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        rendered = renderer.len();
    }

    let summary = json!({
        "total_frames": payload.total_frames,
        "original_total": payload.original_total,
        "source_indices": payload.source_indices,
        "rendered_frames": rendered,
        "metadata": payload.metadata,
    });
    let summary_path = args.output.join("preview.json");
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    println!(
        "{} preview frames ({} before subsampling) saved to {}",
        payload.total_frames,
        payload.original_total,
        args.output.display()
    );
    if rendered > 0 {
        println!("{} rendered frames", rendered);
    }

    Ok(())
}
