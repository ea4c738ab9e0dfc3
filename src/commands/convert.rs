use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use medgif::{ConvertRequest, TaskStore, pipeline};

use super::{InputArgs, RenderArgs, SliceArgs};

#[derive(Args)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub slicing: SliceArgs,

    #[command(flatten)]
    pub render: RenderArgs,

    /// Animation speed (1-30 frames per second)
    #[arg(long, default_value = "10")]
    pub fps: u32,

    /// Longer side of the GIF frames in pixels
    #[arg(long, default_value = "512")]
    pub max_gif_size: u32,

    /// Maximum number of frames, 0 keeps all
    #[arg(long, default_value = "0")]
    pub max_frames: usize,

    /// Write the thumbnails as PNG files into this directory
    #[arg(long)]
    pub thumbnails: Option<PathBuf>,

    /// Write the conversion metadata as JSON
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Output file path
    #[arg(short, long, default_value = "output.gif")]
    pub output: PathBuf,
}

impl ConvertArgs {
    fn request(&self) -> ConvertRequest {
        let slicing = &self.slicing;
        let render = &self.render;
        ConvertRequest {
            mode: slicing.mode.into(),
            orientation: slicing.orientation.into(),
            fps: self.fps,
            colormap: render.colormap.into(),
            slice_start: render.slice_start,
            slice_end: render.slice_end,
            window_mode: slicing.window_mode.into(),
            window_width: slicing.window_width,
            window_level: slicing.window_level,
            flip_horizontal: render.flip_horizontal,
            flip_vertical: render.flip_vertical,
            rotate90: render.rotate90,
            reverse_slices: render.reverse_slices,
            max_gif_size: self.max_gif_size,
            max_frames: self.max_frames,
            sort_by: self.input.sort_by.into(),
            slice_index: slicing.slice_index,
            correct_aspect: !slicing.no_aspect_correction,
        }
    }
}

pub fn run(args: &ConvertArgs) -> Result<()> {
    let limits = args.input.limits()?;
    let files = args.input.read_files()?;
    let store = TaskStore::new();

    let result =
        pipeline::convert(&files, args.request(), &limits, &store).context("Conversion failed")?;
    let gif = store
        .get(&result.task_id)
        .context("Converted GIF is missing from the task store")?;

    std::fs::write(&args.output, gif.as_slice())
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    store.clear(&result.task_id);

    let meta = &result.metadata;
    println!("Task:        {}", result.task_id);
    println!("Frames:      {} of {}", meta.frame_count, meta.source.total_frames);
    println!("Size:        {}x{}", meta.output_size.0, meta.output_size.1);
    println!("Window:      {}", meta.source.window);
    if !meta.transforms.is_empty() {
        println!("Transforms:  {}", meta.transforms.join(", "));
    }
    println!("Saved to {} ({} bytes)", args.output.display(), meta.gif_bytes);

    if let Some(ref dir) = args.thumbnails {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        for (i, png) in result.thumbnails.iter().enumerate() {
            let path = dir.join(format!("thumbnail_{i:02}.png"));
            std::fs::write(&path, png)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        println!("{} thumbnails saved to {}", result.thumbnails.len(), dir.display());
    }

    if let Some(ref path) = args.metadata {
        let json = serde_json::to_string_pretty(meta)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}
