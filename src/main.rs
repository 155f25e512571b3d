//! Prisma CLI - image filters from the command line.
//!
//! A thin calling layer over the library: it decodes an image, builds a
//! filter chain from flags or a settings file and renders it.

use anyhow::{bail, Context, Result};
use prisma::prelude::*;
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("🎨 Prisma - Image Filter Engine v{}", prisma::VERSION);
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    let result = match args[1].as_str() {
        "list" => {
            list_filters();
            Ok(())
        }
        "info" => {
            if args.len() < 3 {
                eprintln!("Error: Please specify a filter ID");
                return;
            }
            filter_info(&args[2])
        }
        "process" => {
            if args.len() < 4 {
                eprintln!("Error: Please specify input and output paths");
                eprintln!(
                    "Usage: {} process <input> <output> [--settings <file>] [--blur <sigma>] ...",
                    args[0]
                );
                return;
            }
            process_image(&args[2..])
        }
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage(&args[0]);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list              List all available filters");
    println!("  info <filter>     Show detailed info about a filter (id or search term)");
    println!("  process <in> <out> [options]  Process an image");
    println!("  help              Show this help message");
    println!();
    println!("Process options:");
    println!("  --settings <file>   Build the chain from a .json or .toml settings file");
    println!("  --blur <sigma>      Gaussian blur");
    println!("  --sharpen <amount>  Laplacian sharpen, 0.0 to 2.0");
    println!("  --grayscale         Convert to grayscale");
    println!("  --equalize          Histogram-equalize luma");
    println!("  --canny <low,high>  Canny edge detection");
    println!("  --gpu               Require the GPU renderer (no CPU fallback)");
    println!();
    println!("Flags are appended after any settings entries, in the order listed.");
}

fn list_filters() {
    let registry = FilterRegistry::with_builtins();
    let grouped = registry.grouped_by_category();

    println!("Available filters ({} total):", registry.len());
    println!();

    for (category, filters) in grouped {
        println!("  📁 {}", category.display_name());
        for metadata in filters {
            println!("      • {} - {}", metadata.id, metadata.description);
        }
        println!();
    }
}

fn filter_info(filter_id: &str) -> Result<()> {
    let registry = FilterRegistry::with_builtins();
    let matches = registry.find(filter_id);
    let metadata = match matches.as_slice() {
        [id] => registry.get_metadata(id),
        [] => None,
        candidates => bail!(
            "'{}' matches several filters: {}",
            filter_id,
            candidates.join(", ")
        ),
    }
    .ok_or_else(|| ParameterError::UnknownFilter(filter_id.to_string()))
    .context("Use 'list' to see available filters")?;

    println!("Filter: {}", metadata.name);
    println!("ID: {}", metadata.id);
    println!("Category: {}", metadata.category.display_name());
    println!("GPU passes: {}", metadata.gpu_passes);
    println!();
    println!("Description:");
    println!("  {}", metadata.description);
    println!();

    if !metadata.parameters.is_empty() {
        println!("Parameters:");
        for param in &metadata.parameters {
            println!(
                "  • {} [{}] = {}",
                param.name, param.value_type, param.default_value
            );
            if !param.description.is_empty() {
                println!("    {}", param.description);
            }
            for constraint in &param.constraints {
                if let Constraint::Range { min, max } = constraint {
                    println!("    range: {} to {}", min, max);
                }
            }
        }
    }
    Ok(())
}

fn next_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(|s| s.as_str())
        .with_context(|| format!("{} needs a value", flag))
}

fn process_image(args: &[String]) -> Result<()> {
    let input_path = Path::new(&args[0]);
    let output_path = Path::new(&args[1]);

    let image = image::open(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;
    let base = PixelBuffer::from(image.to_rgba8());
    println!("📷 Loaded {} ({}x{})", input_path.display(), base.width(), base.height());

    let registry = FilterRegistry::with_builtins();
    let mut chain = FilterChain::new();
    let mut options = RenderOptions::new();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--settings" => {
                let path = next_value(args, i, "--settings")?;
                let settings = FilterSettings::load(path)
                    .with_context(|| format!("Failed to load settings from {}", path))?;
                chain.apply_settings(&settings, &registry)?;
                i += 2;
            }
            "--blur" => {
                let sigma: f32 = next_value(args, i, "--blur")?.parse().context("Invalid --blur")?;
                let size = prisma::core::kernel::force_odd((sigma * 6.0).ceil() as u32).clamp(3, 15);
                let blur = GaussianBlur::new(sigma, size)?;
                let keep = !blur.is_neutral();
                chain.update_or_insert("blur", Box::new(blur), keep);
                i += 2;
            }
            "--sharpen" => {
                let strength: f32 = next_value(args, i, "--sharpen")?
                    .parse()
                    .context("Invalid --sharpen")?;
                let sharpen = Sharpen::new(strength)?;
                let keep = !sharpen.is_neutral();
                chain.update_or_insert("sharpen", Box::new(sharpen), keep);
                i += 2;
            }
            "--grayscale" => {
                chain.set("grayscale", Box::new(Grayscale::new(true)));
                i += 1;
            }
            "--equalize" => {
                let equalize = HistogramEqualization::from_image(&base);
                let keep = !equalize.is_neutral();
                chain.update_or_insert("equalize", Box::new(equalize), keep);
                i += 1;
            }
            "--canny" => {
                let value = next_value(args, i, "--canny")?;
                let (low, high) = value
                    .split_once(',')
                    .with_context(|| format!("--canny expects low,high, got '{}'", value))?;
                let low: f32 = low.trim().parse().context("Invalid --canny low")?;
                let high: f32 = high.trim().parse().context("Invalid --canny high")?;
                let canny = CannyEdge::new(1.0, 5, 0.0, 255.0)?.with_thresholds(low, high);
                chain.set("canny", Box::new(canny));
                i += 2;
            }
            "--gpu" => {
                options = options.with_backend(Backend::Gpu).with_fallback(false);
                i += 1;
            }
            other => bail!("Unknown option: {}", other),
        }
    }

    let report = chain.validate();
    println!("{}", report.summary());
    for warning in &report.warnings {
        println!("   ⚠️  {}", warning);
    }
    if !report.can_render() {
        for line in report.detailed_errors() {
            eprintln!("{}", line);
        }
        bail!("Chain is invalid");
    }

    println!("🔧 Chain: {}", chain.names().join(" → "));
    let mut engine = RenderEngine::new(options);
    let (output, stats) = engine.render(&chain, &base)?;

    println!(
        "✅ {} filters ({} passes) on {} in {:?}",
        stats.filters_applied,
        stats.passes,
        stats.backend_used.unwrap_or_default(),
        stats.duration
    );

    let rgba: image::RgbaImage = output.into();
    rgba.save(output_path)
        .with_context(|| format!("Failed to save {}", output_path.display()))?;
    println!("💾 Saved {}", output_path.display());
    Ok(())
}
