use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use dxbc2glsl::sm4_ir::{TessOutputPrimitive, TessPartitioning};
use dxbc2glsl::{disassemble, DxbcFile, GlslConfig, GlslVersion, ShaderConverter, ShaderModule};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dxbc2glsl",
    about = "Translate compiled SM4/SM5 DXBC shaders into GLSL source."
)]
struct Args {
    /// Compiled shader blob (DXBC container)
    input: PathBuf,

    /// Where to write the result (defaults to stdout)
    output: Option<PathBuf>,

    /// Target GLSL version, e.g. "430", "330 core" or "310 es"
    #[arg(long, value_name = "VERSION", default_value = "430")]
    glsl_version: GlslVersion,

    /// A geometry shader consumes this shader's outputs
    #[arg(long, action = clap::ArgAction::SetTrue)]
    has_gs: bool,

    /// A pixel shader consumes this shader's outputs; with `false`, geometry
    /// shader varyings are dropped
    #[arg(long, value_name = "BOOL", default_value_t = true, action = clap::ArgAction::Set)]
    has_ps: bool,

    /// Tessellator partitioning for domain shaders (integer, pow2, fractional_odd, fractional_even)
    #[arg(long, value_name = "MODE")]
    ds_partitioning: Option<TessPartitioning>,

    /// Tessellator output primitive for domain shaders (point, line, cw, ccw)
    #[arg(long, value_name = "PRIMITIVE")]
    ds_output_primitive: Option<TessOutputPrimitive>,

    /// Print the decoded token stream instead of GLSL
    #[arg(long, action = clap::ArgAction::SetTrue)]
    disasm: bool,

    /// Print the container's chunk table and a reflection summary to stderr
    #[arg(long, action = clap::ArgAction::SetTrue)]
    summary: bool,

    /// Warn when the container checksum does not match its contents
    #[arg(long, action = clap::ArgAction::SetTrue)]
    check_checksum: bool,

    /// Write reflection data (signatures, resources, stage info) as JSON to this path
    #[arg(long, value_name = "PATH")]
    reflection_json: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            eprintln!("If the input is a valid shader, please report this bytecode.");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let bytes = fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;
    let dxbc = DxbcFile::parse(&bytes).with_context(|| format!("parse {}", args.input.display()))?;

    if args.summary {
        eprint!("{}", dxbc.debug_summary());
    }
    if args.check_checksum && !dxbc.checksum_matches() {
        warn!(input = %args.input.display(), "container checksum does not match its contents");
    }

    if args.disasm {
        let module = ShaderModule::build(&dxbc).context("decode shader")?;
        return write_output(args.output.as_deref(), &disassemble(&module));
    }

    let defaults = GlslConfig::new(args.glsl_version);
    let config = GlslConfig {
        has_gs: args.has_gs,
        has_ps: args.has_ps,
        ds_partitioning: args.ds_partitioning.unwrap_or(defaults.ds_partitioning),
        ds_output_primitive: args.ds_output_primitive.unwrap_or(defaults.ds_output_primitive),
        ..defaults
    };

    let mut converter = ShaderConverter::new();
    converter
        .feed(&bytes, &config)
        .with_context(|| format!("translate {}", args.input.display()))?;
    info!(
        stage = ?converter.stage(),
        version = %config.version,
        inputs = converter.num_inputs(),
        outputs = converter.num_outputs(),
        cbuffers = converter.num_cbuffers(),
        resources = converter.num_resources(),
        "translated shader"
    );

    if args.summary {
        eprint!("{}", reflection_summary(&converter));
    }

    if let Some(path) = &args.reflection_json {
        let reflection = converter
            .reflection()
            .context("converter holds no shader after a successful feed")?;
        let json = serde_json::to_string_pretty(&reflection).context("serialize reflection")?;
        fs::write(path, json + "\n").with_context(|| format!("write {}", path.display()))?;
    }

    write_output(args.output.as_deref(), converter.glsl())
}

fn write_output(path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => fs::write(path, text).with_context(|| format!("write {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes()).context("write stdout")?;
            stdout.flush().context("flush stdout")
        }
    }
}

fn reflection_summary(conv: &ShaderConverter) -> String {
    let mut out = String::new();
    if let Some(stage) = conv.stage() {
        out.push_str(&format!("stage: {stage}\n"));
    }
    for i in 0..conv.num_inputs() {
        if let Some((name, index)) = conv.input_semantic(i) {
            out.push_str(&format!("input {i}: {name}{index}\n"));
        }
    }
    for i in 0..conv.num_outputs() {
        if let Some((name, index)) = conv.output_semantic(i) {
            out.push_str(&format!("output {i}: {name}{index}\n"));
        }
    }
    for cb in 0..conv.num_cbuffers() {
        let name = conv.cbuffer_name(cb).unwrap_or("?");
        match conv.cbuffer_bind_point(cb) {
            Some(slot) => out.push_str(&format!("cbuffer {name} (b{slot})\n")),
            None => out.push_str(&format!("cbuffer {name} (unbound)\n")),
        }
        for v in 0..conv.num_variables(cb) {
            let used = if conv.variable_used(cb, v) { "" } else { " (unused)" };
            out.push_str(&format!("  {}{used}\n", conv.variable_name(cb, v).unwrap_or("?")));
        }
    }
    for i in 0..conv.num_resources() {
        let (Some(name), Some(slot), Some(kind)) =
            (conv.resource_name(i), conv.resource_bind_point(i), conv.resource_kind(i))
        else {
            continue;
        };
        let used = if conv.resource_used(i) { "" } else { " (unused)" };
        let dim = conv.resource_dimension(i).map(|d| format!(" {d:?}")).unwrap_or_default();
        out.push_str(&format!("resource {name}: {kind:?}{dim} @ {slot}{used}\n"));
    }
    out
}
