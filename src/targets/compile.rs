use crate::engine::{Target, TargetState};
use crate::project::ProjectContext;
use crate::util;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

/// Compiles one translation unit.
///
/// `prepare` decides staleness from the object/source/dep-file mtimes and,
/// when those are inconclusive, asks the dependency database whether any
/// transitively included header changed. `execute` runs the compiler with
/// `-MMD -MF` so the dep file is refreshed, then records the new header set.
pub struct CompileTarget {
    state: TargetState,
    preds: Vec<Arc<dyn Target>>,
    ctx: Arc<ProjectContext>,
    source: PathBuf,
    object: PathBuf,
    depfile: PathBuf,
    args: Vec<String>,
    outcome: Mutex<Option<CompileOutcome>>,
}

struct CompileOutcome {
    ok: bool,
    stderr: String,
}

impl CompileTarget {
    pub fn new(ctx: Arc<ProjectContext>, source: PathBuf, preds: Vec<Arc<dyn Target>>) -> Arc<Self> {
        // Mirror the source tree under the object directory so equal stems in
        // different directories cannot collide.
        let object = ctx.obj_dir.join(source.with_extension("o"));
        let depfile = object.with_extension("d");
        let args = build_args(&ctx, &source, &object, &depfile);

        Arc::new(Self {
            state: TargetState::new(),
            preds,
            ctx,
            source,
            object,
            depfile,
            args,
            outcome: Mutex::new(None),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn object(&self) -> &Path {
        &self.object
    }

    /// The full compiler invocation, for `compile_commands.json`.
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }

    fn record(&self, ok: bool, stderr: String) {
        *self.outcome.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(CompileOutcome { ok, stderr });
    }
}

impl Target for CompileTarget {
    fn state(&self) -> &TargetState {
        &self.state
    }

    fn predecessors(&self) -> Vec<Arc<dyn Target>> {
        self.preds.clone()
    }

    fn prepare(&self) -> bool {
        let source_tick = util::mtime_tick(&self.source);
        if source_tick == util::MISSING_TICK {
            // Not on disk yet (a generated source); it must be built once its
            // generator has run.
            return true;
        }

        let object_tick = util::mtime_tick(&self.object);
        if object_tick == util::MISSING_TICK || source_tick > object_tick {
            return true;
        }

        if util::mtime_tick(&self.depfile) == util::MISSING_TICK {
            return true;
        }

        self.ctx
            .depend_db
            .are_depends_outdated(&self.depfile, source_tick)
    }

    fn execute(&self) -> bool {
        if let Some(parent) = self.object.parent() {
            if fs::create_dir_all(parent).is_err() {
                self.record(false, format!("cannot create {}", parent.display()));
                return false;
            }
        }

        let output = match Command::new(&self.args[0]).args(&self.args[1..]).output() {
            Ok(output) => output,
            Err(e) => {
                self.record(false, format!("failed to run {}: {e}", self.args[0]));
                return false;
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            self.record(false, stderr);
            return false;
        }

        // Fresh header set for the next build's staleness answers.
        self.ctx.depend_db.update_depends(&self.depfile);
        self.record(true, stderr);
        true
    }

    fn executed(&self) {
        let outcome = self.outcome.lock().unwrap_or_else(|e| e.into_inner());
        match outcome.as_ref() {
            Some(outcome) if outcome.ok => {
                self.ctx
                    .report(&format!("   {} {}", "CC".green(), self.source.display()));
                if self.ctx.verbose {
                    self.ctx.report(&format!("     {}", self.command_line()));
                }
                if !outcome.stderr.is_empty() {
                    self.ctx.report(&format!(
                        "{} Warning in {}:\n{}",
                        "!".yellow(),
                        self.source.display(),
                        outcome.stderr
                    ));
                }
            }
            Some(outcome) => {
                self.ctx.report(&format!(
                    "{} Error compiling {}:\n{}",
                    "x".red(),
                    self.source.display(),
                    outcome.stderr
                ));
            }
            None => {}
        }
    }
}

fn build_args(ctx: &ProjectContext, source: &Path, object: &Path, depfile: &Path) -> Vec<String> {
    let config = &ctx.config;
    let mut args = Vec::new();
    args.push(ctx.compiler.clone());
    args.push("-c".to_string());
    args.push(source.to_string_lossy().to_string());
    args.push("-o".to_string());
    args.push(object.to_string_lossy().to_string());
    args.push(format!("-std={}", config.package.standard));

    // Generate Dependency File
    args.push("-MMD".to_string());
    args.push("-MF".to_string());
    args.push(depfile.to_string_lossy().to_string());

    if ctx.release {
        args.push("-Os".to_string());
    } else {
        args.push("-g".to_string());
        args.push("-Og".to_string());
        args.push("-Wall".to_string());
    }

    if let Some(build_cfg) = &config.build {
        if let Some(mcu) = &build_cfg.mcu {
            args.push(format!("-mcpu={mcu}"));
            args.push("-mthumb".to_string());
        }
        if let Some(include_dirs) = &build_cfg.include_dirs {
            for dir in include_dirs {
                args.push(format!("-I{dir}"));
            }
        }
        if let Some(flags) = &build_cfg.cflags {
            args.extend(flags.iter().cloned());
        }
    }

    args
}
