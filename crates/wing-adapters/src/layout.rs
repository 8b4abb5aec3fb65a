//! Creación del árbol de directorios de un punto del barrido.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use wing_core::PipelineError;
use wing_domain::layout::{aso_config_name, cfd_config_name, template_copy, GEOMETRY_SCRIPT, SUBMIT_SCRIPT};
use wing_domain::{BoundaryLayerMode, StageSelection, WorkspaceLayout};

/// Copia pendiente de una plantilla a su directorio de etapa.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateCopy {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Crea workspaces a partir de un directorio de plantillas.
#[derive(Debug, Clone)]
pub struct LayoutManager {
    template_dir: PathBuf,
}

impl LayoutManager {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self { template_dir: template_dir.into() }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Plantilla del script de envío.
    pub fn job_template(&self) -> PathBuf {
        self.template_dir.join(SUBMIT_SCRIPT)
    }

    /// Directorios implicados por las etapas activas. El bucle de
    /// convergencia vuelve a mallar, así que un CFD RANS también necesita el
    /// directorio de malla.
    pub fn stage_dirs(&self, layout: &WorkspaceLayout, selection: &StageSelection) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for stage in selection.enabled_stages() {
            let solver = selection.solver_for(stage).unwrap_or(selection.flow_solver);
            dirs.push(layout.stage_dir(stage, selection.mesh_mode, solver));
        }
        if selection.needs_mesh_convergence() && !selection.mesh {
            dirs.push(layout.mesh_dir(BoundaryLayerMode::WithPrism));
        }
        dirs
    }

    /// Plantillas que necesita la selección, con su destino `.in`.
    pub fn template_copies(&self, layout: &WorkspaceLayout, selection: &StageSelection) -> Vec<TemplateCopy> {
        let mut copies = Vec::new();
        let mut push = |name: String, rendered: PathBuf| {
            copies.push(TemplateCopy { source: self.template_dir.join(name),
                                       destination: template_copy(&rendered) })
        };
        if selection.geometry {
            push(GEOMETRY_SCRIPT.to_string(), layout.geometry_script());
        }
        if selection.mesh || selection.needs_mesh_convergence() {
            let mode = if selection.mesh { selection.mesh_mode } else { BoundaryLayerMode::WithPrism };
            push(format!("macro_{}.java", mode.dir_name()), layout.mesh_macro(mode));
        }
        if selection.flow_solve {
            let solver = selection.flow_solver;
            push(cfd_config_name(solver), layout.cfd_config(solver));
        }
        if selection.optimize {
            let solver = selection.optimizer_solver;
            push(aso_config_name(solver), layout.aso_config(solver));
        }
        copies
    }

    /// Crea los directorios de las etapas activas y copia sus plantillas.
    /// Idempotente: repetirlo sobrescribe las copias y no falla.
    pub fn ensure_layout(&self, root: &Path, selection: &StageSelection) -> Result<WorkspaceLayout, PipelineError> {
        let layout = WorkspaceLayout::new(root);
        let copies = self.template_copies(&layout, selection);
        // todas las plantillas deben existir antes de tocar el disco
        if let Some(missing) = copies.iter().find(|c| !c.source.is_file()) {
            return Err(PipelineError::MissingTemplate { path: missing.source.clone() });
        }

        create_dir(root)?;
        for dir in self.stage_dirs(&layout, selection) {
            create_dir(&dir)?;
        }
        for copy in &copies {
            fs::copy(&copy.source, &copy.destination).map_err(|e| PipelineError::io(&copy.destination, e))?;
            debug!("layout:copy src={} dst={}", copy.source.display(), copy.destination.display());
        }
        info!("layout:ready root={} stages={:?}",
              root.display(),
              selection.enabled_stages().iter().map(|s| s.id()).collect::<Vec<_>>());
        Ok(layout)
    }
}

fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(|e| PipelineError::DirectoryCreation { path: path.to_path_buf(),
                                                                            reason: e.to_string() })
}

/// Lista de plantillas que un directorio debe contener para cualquier selección.
pub fn all_template_names() -> Vec<String> {
    use wing_domain::SolverKind;
    let mut names = vec![SUBMIT_SCRIPT.to_string(),
                         GEOMETRY_SCRIPT.to_string(),
                         format!("macro_{}.java", BoundaryLayerMode::WithPrism.dir_name()),
                         format!("macro_{}.java", BoundaryLayerMode::WithoutPrism.dir_name())];
    for solver in [SolverKind::Inviscid, SolverKind::Viscous] {
        names.push(cfd_config_name(solver));
        names.push(aso_config_name(solver));
    }
    names
}

#[cfg(test)]
pub(crate) mod tests {
    use wing_domain::SolverKind;

    use super::*;

    /// Directorio de plantillas mínimo con todos los ficheros.
    pub(crate) fn template_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in all_template_names() {
            fs::write(dir.path().join(&name), format!("template {name}\n")).unwrap();
        }
        dir
    }

    fn dirs_under(root: &Path) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    out.push(path.strip_prefix(root).unwrap().display().to_string());
                    stack.push(path);
                }
            }
        }
        out.sort();
        out
    }

    #[test]
    fn creates_only_enabled_stage_dirs() {
        let templates = template_dir();
        let out = tempfile::tempdir().unwrap();
        let mut sel = StageSelection::full(SolverKind::Inviscid);
        sel.optimize = false;
        let layout = LayoutManager::new(templates.path()).ensure_layout(&out.path().join("w"), &sel)
                                                       .unwrap();
        assert_eq!(dirs_under(layout.root()),
                   vec!["CFD", "CFD/Euler", "GEOMETRY", "MESH", "MESH/without_prism"]);
        assert!(layout.geometry_dir().join("winggen.vspscript.in").is_file());
        assert!(layout.mesh_dir(BoundaryLayerMode::WithoutPrism).join("macro.java.in").is_file());
        let macro_text = fs::read_to_string(layout.mesh_dir(BoundaryLayerMode::WithoutPrism).join("macro.java.in"))
            .unwrap();
        assert_eq!(macro_text, "template macro_without_prism.java\n");
    }

    #[test]
    fn ensure_layout_is_idempotent() {
        let templates = template_dir();
        let out = tempfile::tempdir().unwrap();
        let manager = LayoutManager::new(templates.path());
        let sel = StageSelection::full(SolverKind::Viscous);
        let root = out.path().join("w");
        manager.ensure_layout(&root, &sel).unwrap();
        let first = dirs_under(&root);
        manager.ensure_layout(&root, &sel).unwrap();
        assert_eq!(dirs_under(&root), first);
    }

    #[test]
    fn missing_template_aborts_before_creating_dirs() {
        let templates = template_dir();
        fs::remove_file(templates.path().join("RANS-cfd.cfg")).unwrap();
        let out = tempfile::tempdir().unwrap();
        let root = out.path().join("w");
        let err = LayoutManager::new(templates.path()).ensure_layout(&root, &StageSelection::full(SolverKind::Viscous))
                                                      .unwrap_err();
        assert_eq!(err,
                   PipelineError::MissingTemplate { path: templates.path().join("RANS-cfd.cfg") });
        assert!(!root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_parent_is_a_directory_creation_error() {
        let templates = template_dir();
        let out = tempfile::tempdir().unwrap();
        let blocker = out.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = LayoutManager::new(templates.path()).ensure_layout(&blocker.join("w"),
                                                                     &StageSelection::full(SolverKind::Inviscid))
                                                      .unwrap_err();
        assert!(matches!(err, PipelineError::DirectoryCreation { .. }));
    }

    #[test]
    fn rans_solve_alone_still_prepares_mesh_macro() {
        let templates = template_dir();
        let out = tempfile::tempdir().unwrap();
        let sel = StageSelection { geometry: false,
                                   mesh: false,
                                   optimize: false,
                                   ..StageSelection::full(SolverKind::Viscous) };
        let layout = LayoutManager::new(templates.path()).ensure_layout(out.path(), &sel).unwrap();
        assert!(layout.mesh_dir(BoundaryLayerMode::WithPrism).join("macro.java.in").is_file());
        assert!(layout.cfd_dir(SolverKind::Viscous).join("RANS-cfd.cfg.in").is_file());
    }
}
