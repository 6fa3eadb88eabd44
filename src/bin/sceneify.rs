use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sceneify::{Compositor, LinkOptions, MemoryBackend, MemoryState, SceneDocument};

#[derive(Parser, Debug)]
#[command(name = "sceneify", version)]
struct Cli {
    /// Log every request sent to the compositor.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile a scene document against a saved compositor state.
    Apply(ApplyArgs),
    /// Print the scenes and placements of a saved compositor state.
    Show(ShowArgs),
}

#[derive(Parser, Debug)]
struct ApplyArgs {
    /// Scene document JSON.
    #[arg(long)]
    doc: PathBuf,

    /// Compositor state JSON; a missing file starts from an empty compositor.
    #[arg(long)]
    state: PathBuf,

    /// Where to write the resulting state (defaults to `--state`).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Adopt existing scenes instead of provisioning them.
    #[arg(long)]
    link: bool,

    /// With `--link`, push declared transforms onto adopted placements.
    #[arg(long, requires = "link")]
    set_properties: bool,

    /// With `--link`, push declared input settings onto adopted inputs.
    #[arg(long, requires = "link")]
    set_source_settings: bool,

    /// Make this scene the program scene afterwards.
    #[arg(long)]
    program: Option<String>,
}

#[derive(Parser, Debug)]
struct ShowArgs {
    /// Compositor state JSON.
    #[arg(long)]
    state: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Apply(args) => cmd_apply(args),
        Command::Show(args) => cmd_show(args),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::TRACE
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_state(path: &Path) -> anyhow::Result<MemoryState> {
    if !path.exists() {
        return Ok(MemoryState::default());
    }
    let f = File::open(path).with_context(|| format!("open state '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse state JSON '{}'", path.display()))
}

fn write_state(path: &Path, state: &MemoryState) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create state '{}'", path.display()))?;
    serde_json::to_writer_pretty(f, state).with_context(|| "write state JSON")?;
    Ok(())
}

fn cmd_apply(args: ApplyArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.doc)
        .with_context(|| format!("read scene document '{}'", args.doc.display()))?;
    let graph = SceneDocument::from_json(&text)?.build()?;
    let obs = Compositor::new(MemoryBackend::from_state(read_state(&args.state)?));

    let options = LinkOptions {
        set_properties: args.set_properties,
        set_source_settings: args.set_source_settings,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("start runtime")?;
    runtime.block_on(async {
        for scene in &graph.children_first() {
            if args.link {
                scene
                    .link(&obs, options)
                    .await
                    .with_context(|| format!("link scene '{}'", scene.name()))?;
            } else {
                scene
                    .create(&obs)
                    .await
                    .with_context(|| format!("create scene '{}'", scene.name()))?;
            }
        }
        if let Some(name) = &args.program {
            let scene = graph
                .scene(name)
                .with_context(|| format!("scene '{name}' is not declared in the document"))?;
            scene.make_current(&obs, false).await?;
        }
        anyhow::Ok(())
    })?;

    for scene in &graph.scenes {
        println!("scene {}", scene.name());
        for item in scene.items() {
            let t = item.transform();
            println!(
                "  {:<16} -> {:<16} id={} size={}x{}",
                item.item_ref(),
                item.source().name(),
                item.id(),
                t.width,
                t.height
            );
        }
    }

    let out = args.out.as_ref().unwrap_or(&args.state);
    write_state(out, &obs.into_backend().snapshot())?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_show(args: ShowArgs) -> anyhow::Result<()> {
    let state = read_state(&args.state)?;
    if let Some(program) = &state.program_scene {
        println!("program {program}");
    }
    for (name, scene) in &state.scenes {
        println!("scene {name}");
        for item in &scene.items {
            println!(
                "  [{}] {} enabled={} locked={}",
                item.id, item.source_name, item.enabled, item.locked
            );
        }
    }
    for (name, input) in &state.inputs {
        println!("input {name} ({})", input.kind);
    }
    Ok(())
}
