use crate::config::McxConfig;
use crate::depend::DependDb;
use crate::engine::Target;
use crate::targets::{CompileTarget, FirmwareTarget, LinkTarget, VersionTarget};
use crate::toolchain;
use crate::util;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

const SOURCE_EXTS: &[&str] = &["c", "cc", "cpp", "cxx"];

/// Everything the concrete targets need to do their job: the manifest, the
/// resolved tool paths, the build directories, and the shared dependency
/// database. Injected into every target at construction time.
pub struct ProjectContext {
    pub config: McxConfig,
    pub release: bool,
    pub verbose: bool,
    pub compiler: String,
    pub objcopy: String,
    pub build_dir: PathBuf,
    pub obj_dir: PathBuf,
    pub db_path: PathBuf,
    pub depend_db: DependDb,
    progress: Mutex<Option<ProgressBar>>,
}

impl ProjectContext {
    pub fn new(config: McxConfig, release: bool, verbose: bool) -> Result<Self> {
        let profile = if release { "release" } else { "debug" };
        let build_dir = Path::new("build").join(profile);
        let obj_dir = build_dir.join("obj");
        fs::create_dir_all(&obj_dir).context("Failed to create build directory")?;

        let db_path = build_dir.join("depend_db.json");
        let depend_db = DependDb::new(&db_path, None);
        let has_cpp = project_has_cpp();
        let compiler = toolchain::get_compiler(&config, has_cpp);
        let objcopy = toolchain::get_objcopy(&config);

        Ok(Self {
            config,
            release,
            verbose,
            compiler,
            objcopy,
            build_dir,
            obj_dir,
            db_path,
            depend_db,
            progress: Mutex::new(None),
        })
    }

    /// Install the progress bar used by `executed()` reporting. Called by the
    /// CLI from the `on_executing` callback once the job count is known.
    pub fn set_progress(&self, bar: ProgressBar) {
        *self.progress.lock().unwrap_or_else(|e| e.into_inner()) = Some(bar);
    }

    pub fn finish_progress(&self) {
        if let Some(bar) = self
            .progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            bar.finish_and_clear();
        }
    }

    /// Print a status line without tearing the progress bar, and advance it.
    pub fn report(&self, line: &str) {
        let guard = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(bar) => {
                bar.println(line);
                bar.inc(1);
            }
            None => println!("{line}"),
        }
    }
}

/// The assembled build graph: the firmware image is the root, every compile
/// target feeds the linker, and the version stamp sits beneath its own
/// compile target.
pub struct ProjectGraph {
    pub root: Arc<dyn Target>,
    pub sources: usize,
}

// --- CORE: Assemble Build Graph ---
pub fn assemble_graph(ctx: &Arc<ProjectContext>) -> Result<Option<ProjectGraph>> {
    // 1. Collect source files
    let mut source_files = collect_sources(Path::new("src"));
    if source_files.is_empty() {
        return Ok(None);
    }

    // 2. Version stamp target; its source compiles like any other
    let version_source = ctx
        .config
        .firmware
        .as_ref()
        .and_then(|fw| fw.version_source.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new("src").join("version.c"));

    if !source_files.iter().any(|s| *s == version_source) {
        source_files.push(version_source.clone());
    }
    source_files.sort();

    let version = VersionTarget::new(Arc::clone(ctx), version_source.clone());
    let version_dyn: Arc<dyn Target> = version;

    // 3. One compile target per source
    let mut compiles: Vec<Arc<CompileTarget>> = Vec::with_capacity(source_files.len());
    for source in &source_files {
        let preds = if *source == version_source {
            vec![Arc::clone(&version_dyn)]
        } else {
            Vec::new()
        };
        compiles.push(CompileTarget::new(Arc::clone(ctx), source.clone(), preds));
    }

    // 4. Link and firmware image
    let elf_path = ctx
        .build_dir
        .join(format!("{}.elf", ctx.config.package.name));
    let link = LinkTarget::new(
        Arc::clone(ctx),
        compiles.iter().map(|c| c.object().to_path_buf()).collect(),
        elf_path.clone(),
        compiles
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn Target>)
            .collect(),
        Arc::clone(&version_dyn),
    );

    let firmware = FirmwareTarget::new(
        Arc::clone(ctx),
        elf_path,
        Arc::clone(&link) as Arc<dyn Target>,
        Arc::clone(&version_dyn),
    );

    // 5. Generate compile_commands.json for IDE tooling
    write_compile_commands(&compiles)?;

    let root: Arc<dyn Target> = firmware;
    Ok(Some(ProjectGraph {
        root,
        sources: source_files.len(),
    }))
}

fn collect_sources(src_dir: &Path) -> Vec<PathBuf> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(src_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if let Some(ext) = path.extension() {
            let s = ext.to_string_lossy();
            if SOURCE_EXTS.contains(&s.as_ref()) {
                sources.push(path.to_owned());
            }
        }
    }
    sources
}

fn project_has_cpp() -> bool {
    collect_sources(Path::new("src"))
        .iter()
        .any(|p| p.extension().map_or(false, |ext| ext != "c"))
}

fn write_compile_commands(compiles: &[Arc<CompileTarget>]) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let current_dir_str = current_dir.to_string_lossy().to_string();

    let entries: Vec<serde_json::Value> = compiles
        .iter()
        .map(|compile| {
            json!({
                "directory": current_dir_str,
                "command": compile.command_line(),
                "file": compile.source().to_string_lossy(),
            })
        })
        .collect();

    let json_str = serde_json::to_string_pretty(&entries)?;
    util::write_if_changed(Path::new("compile_commands.json"), json_str.as_bytes())?;
    Ok(())
}
