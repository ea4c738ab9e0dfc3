use anyhow::Result;
use clap::Args;
use medgif::{ExtractOptions, Mode, Orientation, VolumeLoader};

use super::InputArgs;

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let limits = args.input.limits()?;
    let files = args.input.read_files()?;
    let volume = VolumeLoader::load(&files, &limits.load_options(args.input.sort_by.into()))?;

    let (t, d, h, w) = volume.dim();
    let (sx, sy, sz) = volume.spacing();
    let info = volume.info();

    println!("Files:       {}", files.len());
    println!("Type:        {:?}", info.file_type);
    println!("Shape:       {}x{}x{} ({} timepoints)", w, h, d, t);
    println!("Spacing:     {:.3} x {:.3} x {:.3} mm", sx, sy, sz);
    if let Some(ref modality) = info.modality {
        println!("Modality:    {}", modality);
    }
    println!("Reoriented:  {}", info.reoriented);

    for orientation in [Orientation::Axial, Orientation::Coronal, Orientation::Sagittal] {
        let options = ExtractOptions {
            orientation,
            ..Default::default()
        };
        println!("{:<13}{} frames", format!("{orientation}:"), volume.frame_count(&options));
    }
    let series = ExtractOptions {
        mode: Mode::Series,
        ..Default::default()
    };
    println!("{:<13}{} frames", "series:", volume.frame_count(&series));

    let total_mb = (volume.voxel_count() * std::mem::size_of::<f32>()) as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}
