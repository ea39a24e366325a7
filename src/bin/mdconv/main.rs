//! mdconv CLI - Inspect, convert and verify animated model containers.

use mdconv::io::{decode_bytes, detect_format, encode_bytes, sibling_path, Input};
use mdconv::model::{Attachment, Lod, Model};
use mdconv::{convert, read_model, write_model, ConvertOptions, Format, TagStyle};
use rayon::prelude::*;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "MDCONV_LOG";

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    match filtered_args[0] {
        // Info command - model summary
        "info" | "i" => {
            let Some(path) = filtered_args.get(1) else {
                usage("mdconv info <file> [--json]");
            };
            let json_mode = filtered_args[2..].iter().any(|&s| s == "--json" || s == "-j");
            cmd_info(path, json_mode);
        }

        // Convert command - one file to another format
        "convert" | "c" => {
            if filtered_args.len() < 3 {
                usage("mdconv convert <input> <output> [--bind N] [--lod] [--tags free|bone|offset] [--tag-bone TAG=BONE]");
            }
            let opts = parse_convert_options(&filtered_args[3..]);
            cmd_convert(filtered_args[1], filtered_args[2], &opts);
        }

        // Batch command - many files in parallel
        "batch" | "b" => {
            if filtered_args.len() < 4 {
                usage("mdconv batch <out-dir> <format> <inputs...>");
            }
            cmd_batch(filtered_args[1], filtered_args[2], &filtered_args[3..]);
        }

        // Check command - byte-exact round trip
        "check" | "k" => {
            let Some(path) = filtered_args.get(1) else {
                usage("mdconv check <file>");
            };
            cmd_check(path);
        }

        "help" | "h" | "-h" | "--help" => print_help(),

        // A bare model file is shorthand for info
        other if Format::from_path(other).is_some() => cmd_info(other, false),

        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Run 'mdconv help' for usage");
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn usage(text: &str) -> ! {
    eprintln!("Error: missing argument");
    eprintln!("Usage: {}", text);
    std::process::exit(1);
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, err);
    std::process::exit(1);
}

fn print_help() {
    println!("mdconv - animated model container toolkit");
    println!();
    println!("USAGE:");
    println!("    mdconv [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info    <file> [--json]              Show model summary");
    println!("    c, convert <in> <out> [flags]           Convert; target format from <out> extension");
    println!("    b, batch   <out-dir> <format> <in...>   Convert many files in parallel");
    println!("    k, check   <file>                       Decode and re-encode, compare bytes");
    println!("    h, help                                 Show this help");
    println!();
    println!("CONVERT FLAGS:");
    println!("    --bind N          Frame used as bind pose (default 0)");
    println!("    --lod             Regenerate collapse maps even if present");
    println!("    --tags STYLE      Force tag style: free, bone or offset");
    println!("    --tag-bone T=B    Bind tag T to bone B for bone-bound targets");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose     Show debug output");
    println!("    -vv, --trace      Show trace output (very verbose)");
    println!("    -q, --quiet       Only show errors");
    println!();
    println!("ENVIRONMENT:");
    println!("    {}         Log filter, e.g. mdconv=debug", LOG_ENV);
    println!();
    println!("EXAMPLES:");
    println!("    mdconv info body.mds");
    println!("    mdconv convert body.mds body.md3 --bind 12");
    println!("    mdconv convert weapon.md3 weapon.mdc");
    println!("    mdconv batch out/ mdc models/*.md3");
    println!("    mdconv check head.mdm            # also checks head.mdx");
}

// ============================================================================
// Info
// ============================================================================

fn cmd_info(path: &str, json_mode: bool) {
    info!("Opening model: {}", path);

    let (format, outcome) = match read_model(path) {
        Ok(r) => r,
        Err(e) => fail(&format!("Failed to read {}", path), e),
    };
    let model = &outcome.value;

    if json_mode {
        let value = serde_json::json!({
            "path": path,
            "format": format.to_string(),
            "summary": summary_json(model),
            "warnings": outcome.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&value) {
            Ok(s) => println!("{}", s),
            Err(e) => fail("Failed to serialize", e),
        }
        return;
    }

    println!("File:     {}", path);
    println!("Format:   {} (version {})", format, format.version());
    println!("Name:     {}", model.name);
    println!("Frames:   {}", model.frame_count());
    println!();

    println!("Surfaces: {}", model.surfaces.len());
    for s in &model.surfaces {
        let kind = if s.vertices.is_rigged() { "rigged" } else { "morph" };
        println!(
            "  {:<20} {:>6} verts {:>6} tris  {}",
            s.name,
            s.vertex_count(),
            s.triangles.len(),
            kind
        );
    }

    if let Some(skeleton) = &model.skeleton {
        println!("Bones:    {}", skeleton.bones.len());
        if let Some(torso) = skeleton.torso_parent.and_then(|t| skeleton.bones.get(t as usize)) {
            println!("  torso parent: {}", torso.name);
        }
    }

    println!("Tags:     {}", model.tags.len());
    for tag in &model.tags {
        println!("  {:<20} {}", tag.name, describe_attachment(&tag.attachment));
    }

    if let Some(lod) = &model.lod {
        match lod {
            Lod::CollapseMap { scale, bias, .. } => {
                println!("LOD:      collapse maps (scale {}, bias {})", scale, bias)
            }
            Lod::Discrete { .. } => println!("LOD:      discrete"),
        }
        println!("  min vertices: {:?}", lod.min_vertices());
    }

    if !outcome.warnings.is_empty() {
        println!();
        println!("Warnings: {}", outcome.warnings.len());
        for w in &outcome.warnings {
            println!("  {}", w);
        }
    }
}

fn summary_json(model: &Model) -> serde_json::Value {
    let surfaces: Vec<serde_json::Value> = model
        .surfaces
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.name,
                "vertices": s.vertex_count(),
                "triangles": s.triangles.len(),
                "rigged": s.vertices.is_rigged(),
                "shaders": s.shaders.iter().map(|sh| sh.name.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();
    let tags: Vec<serde_json::Value> = model
        .tags
        .iter()
        .map(|t| serde_json::json!({ "name": t.name, "style": t.attachment.style() }))
        .collect();
    let bones: Vec<&str> = model
        .skeleton
        .iter()
        .flat_map(|s| s.bones.iter().map(|b| b.name.as_str()))
        .collect();
    let lod = match &model.lod {
        Some(Lod::CollapseMap { scale, bias, surfaces }) => serde_json::json!({
            "kind": "collapse-map",
            "scale": scale,
            "bias": bias,
            "min_vertices": model.lod.as_ref().map(Lod::min_vertices),
            "collapsed": surfaces.iter().map(|m| m.map.iter().filter(|&&t| t >= 0).count()).collect::<Vec<_>>(),
        }),
        Some(Lod::Discrete { min_vertices }) => serde_json::json!({
            "kind": "discrete",
            "min_vertices": min_vertices,
        }),
        None => serde_json::Value::Null,
    };
    serde_json::json!({
        "name": model.name,
        "frames": model.frame_count(),
        "surfaces": surfaces,
        "tags": tags,
        "bones": bones,
        "lod": lod,
    })
}

fn describe_attachment(attachment: &Attachment) -> String {
    match attachment {
        Attachment::Free(frames) => format!("free, {} frames", frames.len()),
        Attachment::Bone { bone, torso_weight } => format!("bone {} (torso weight {})", bone, torso_weight),
        Attachment::BoneOffset { bone, offset, .. } => {
            format!("bone {} offset ({}, {}, {})", bone, offset.x, offset.y, offset.z)
        }
    }
}

// ============================================================================
// Convert
// ============================================================================

fn parse_convert_options(args: &[&str]) -> ConvertOptions {
    let mut opts = ConvertOptions::default();
    let mut it = args.iter();
    while let Some(&arg) = it.next() {
        match arg {
            "--bind" => {
                let frame = it.next().and_then(|s| s.parse::<usize>().ok());
                match frame {
                    Some(f) => opts = opts.with_bind_frame(f),
                    None => usage("--bind <frame number>"),
                }
            }
            "--lod" => opts = opts.with_regenerate_lod(true),
            "--tags" => match it.next().and_then(|s| TagStyle::parse(s)) {
                Some(style) => opts = opts.with_tag_style(style),
                None => usage("--tags free|bone|offset"),
            },
            "--tag-bone" => match it.next().and_then(|s| s.split_once('=')) {
                Some((tag, bone)) => opts = opts.with_tag_bone(tag, bone),
                None => usage("--tag-bone <tag>=<bone>"),
            },
            other => {
                eprintln!("Unknown convert flag: {}", other);
                std::process::exit(1);
            }
        }
    }
    opts
}

/// Read, convert and write one file. Returns the paths written.
fn convert_file(input: &Path, output: &Path, target: Format, opts: &ConvertOptions) -> mdconv::Result<Vec<PathBuf>> {
    let (source, outcome) = read_model(input)?;
    debug!("Read {} as {}", input.display(), source);
    let converted = convert(&outcome.value, target, opts)?;
    let written = write_model(&converted.value, output, target)?;
    let warnings = outcome.warnings.len() + converted.warnings.len();
    if warnings > 0 {
        info!("{}: {} warnings", input.display(), warnings);
    }
    Ok(written)
}

fn cmd_convert(input: &str, output: &str, opts: &ConvertOptions) {
    let Some(target) = Format::from_path(output) else {
        fail("Cannot infer target format", output);
    };
    info!("Converting {} -> {} ({})", input, output, target);

    match convert_file(Path::new(input), Path::new(output), target, opts) {
        Ok(written) => {
            for path in written {
                println!("Wrote {}", path.display());
            }
        }
        Err(e) => fail(&format!("Failed to convert {}", input), e),
    }
}

fn cmd_batch(out_dir: &str, format: &str, inputs: &[&str]) {
    let Some(target) = Format::from_extension(format) else {
        fail("Unknown format", format);
    };
    let out_dir = Path::new(out_dir);
    if let Err(e) = std::fs::create_dir_all(out_dir) {
        fail(&format!("Failed to create {}", out_dir.display()), e);
    }
    let opts = ConvertOptions::default();
    info!("Converting {} files to {}", inputs.len(), target);

    let results: Vec<(&str, mdconv::Result<Vec<PathBuf>>)> = inputs
        .par_iter()
        .map(|&input| {
            let path = Path::new(input);
            let stem = path.file_stem().unwrap_or(path.as_os_str());
            let output = out_dir.join(stem).with_extension(target.extension());
            (input, convert_file(path, &output, target, &opts))
        })
        .collect();

    let mut failed = 0;
    for (input, result) in &results {
        match result {
            Ok(written) => debug!("{} -> {} files", input, written.len()),
            Err(e) => {
                failed += 1;
                eprintln!("FAIL {}: {}", input, e);
            }
        }
    }
    println!("Converted {}/{} files", results.len() - failed, results.len());
    if failed > 0 {
        std::process::exit(1);
    }
}

// ============================================================================
// Check
// ============================================================================

fn cmd_check(path: &str) {
    let path = Path::new(path);
    let input = match Input::open(path) {
        Ok(i) => i,
        Err(e) => fail(&format!("Failed to open {}", path.display()), e),
    };
    let format = match detect_format(path, &input) {
        Ok(f) => f,
        Err(e) => fail("Failed to detect format", e),
    };

    let sibling = if format == Format::Mdm {
        match Input::open(sibling_path(path)) {
            Ok(s) => Some(s),
            Err(e) => fail("MDM check needs its MDX", e),
        }
    } else {
        None
    };

    let outcome = match decode_bytes(format, &input, sibling.as_deref()) {
        Ok(o) => o,
        Err(e) => fail("Decode failed", e),
    };
    if !outcome.warnings.is_empty() {
        println!("{} warnings while decoding", outcome.warnings.len());
    }
    let encoded = match encode_bytes(&outcome.value, format) {
        Ok(e) => e,
        Err(e) => fail("Encode failed", e),
    };

    let mut ok = report_match(&path.display().to_string(), &input, &encoded.data);
    if let (Some(original), Some(rewritten)) = (&sibling, &encoded.sibling) {
        ok &= report_match(&sibling_path(path).display().to_string(), original, rewritten);
    }
    if !ok {
        std::process::exit(1);
    }
}

/// Print whether two buffers are identical, pointing at the first difference.
fn report_match(label: &str, original: &[u8], rewritten: &[u8]) -> bool {
    if original == rewritten {
        println!("OK   {} ({} bytes)", label, original.len());
        return true;
    }
    let first = original
        .iter()
        .zip(rewritten)
        .position(|(a, b)| a != b)
        .unwrap_or(original.len().min(rewritten.len()));
    println!(
        "DIFF {}: {} vs {} bytes, first difference at offset {:#x}",
        label,
        original.len(),
        rewritten.len(),
        first
    );
    false
}
