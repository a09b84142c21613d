//! Command handlers for the `ctxdrop` binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use context_dropper::config::Settings;
use context_dropper::context::{
    self, drop_context_within, FsArtifactWriter, PathKey, STRUCTURE_FOOTER, STRUCTURE_HEADER,
};
use context_dropper::db::Database;
use context_dropper::models::*;

pub struct App {
    db: Database,
    settings: Settings,
    project: Option<String>,
}

impl App {
    pub fn new(db: Database, settings: Settings, project: Option<String>) -> Self {
        Self {
            db,
            settings,
            project,
        }
    }

    /// The project named by `--project`, or the active one.
    fn current_project(&self) -> Result<Project> {
        match &self.project {
            Some(name) => self.project_named(name),
            None => self.db.get_active_project()?.ok_or_else(|| {
                anyhow!("No active project. Run `ctxdrop project use <name>` or pass --project")
            }),
        }
    }

    fn project_named(&self, name: &str) -> Result<Project> {
        self.db
            .get_project_by_name(name)?
            .ok_or_else(|| anyhow!("Project not found: {name}"))
    }

    fn category_named(&self, project: &Project, name: Option<&str>) -> Result<Option<Category>> {
        let Some(name) = name else {
            return Ok(None);
        };
        self.db
            .get_category_by_name(project.id, name)?
            .map(Some)
            .ok_or_else(|| anyhow!("Category not found: {name}"))
    }

    // ============================================================
    // Projects
    // ============================================================

    pub fn project_add(&self, name: &str, root: &Path, prompt: Option<String>) -> Result<()> {
        if !root.is_dir() {
            bail!("Project path is not a valid directory: {}", root.display());
        }
        let project = self.db.create_project(CreateProjectInput {
            name: name.to_string(),
            root_path: root.to_string_lossy().into_owned(),
            prompt_guide: prompt,
        })?;

        if self.db.get_active_project()?.is_none() {
            self.db.set_active_project(Some(project.id))?;
        }
        println!("Added project {} at {}", project.name, project.root_path);
        Ok(())
    }

    pub fn project_list(&self) -> Result<()> {
        for project in self.db.get_all_projects()? {
            let marker = if project.is_active { "*" } else { " " };
            println!("{marker} {}  {}", project.name, project.root_path);
        }
        Ok(())
    }

    pub fn project_use(&self, name: &str) -> Result<()> {
        let project = self.project_named(name)?;
        self.db.set_active_project(Some(project.id))?;
        println!("Active project: {}", project.name);
        Ok(())
    }

    pub fn project_remove(&self, name: &str) -> Result<()> {
        let project = self.project_named(name)?;
        self.db.delete_project(project.id)?;
        println!("Removed project {}", project.name);
        Ok(())
    }

    pub fn project_prompt(&self, name: &str, text: String) -> Result<()> {
        let project = self.project_named(name)?;
        self.db.update_project(
            project.id,
            UpdateProjectInput {
                prompt_guide: Some(text),
                ..Default::default()
            },
        )?;
        println!("Updated prompt guide for {}", project.name);
        Ok(())
    }

    pub fn project_show(&self, name: Option<&str>) -> Result<()> {
        let project = match name {
            Some(name) => self.project_named(name)?,
            None => self.current_project()?,
        };
        let selections = self.db.get_selections(project.id, None)?;
        let categories = self.db.get_categories(project.id)?;

        println!("Name:       {}", project.name);
        println!("Root:       {}", project.root_path);
        println!("Active:     {}", if project.is_active { "yes" } else { "no" });
        println!("Selections: {}", selections.len());
        println!("Categories: {}", categories.len());
        println!();
        println!("{}", project.prompt_guide);
        Ok(())
    }

    // ============================================================
    // Categories
    // ============================================================

    pub fn category_add(&self, name: &str) -> Result<()> {
        let project = self.current_project()?;
        let category = self.db.create_category(
            project.id,
            CreateCategoryInput {
                name: name.to_string(),
            },
        )?;
        println!("Added category {}", category.name);
        Ok(())
    }

    pub fn category_list(&self) -> Result<()> {
        let project = self.current_project()?;
        for category in self.db.get_categories(project.id)? {
            println!("{}", category.name);
        }
        Ok(())
    }

    pub fn category_remove(&self, name: &str) -> Result<()> {
        let project = self.current_project()?;
        let category = self
            .category_named(&project, Some(name))?
            .ok_or_else(|| anyhow!("Category not found: {name}"))?;
        self.db.delete_category(category.id)?;
        println!("Removed category {}", category.name);
        Ok(())
    }

    // ============================================================
    // Selections
    // ============================================================

    pub fn select(&self, path: &Path, types: Option<&str>, category: Option<&str>) -> Result<()> {
        let project = self.current_project()?;
        let category = self.category_named(&project, category)?;
        let path = absolute(path);

        let input = UpsertSelectionInput::for_path(&path, types)?;

        let selection = self
            .db
            .upsert_selection(project.id, input.in_category(category.map(|c| c.id)))?;
        let category = match selection.category_id {
            Some(id) => self.db.get_category(id)?,
            None => None,
        };
        println!(
            "Selected {}",
            describe_selection(
                Path::new(&project.root_path),
                &selection,
                category.as_ref().map(|c| c.name.as_str())
            )
        );
        Ok(())
    }

    pub fn unselect(&self, path: &Path) -> Result<()> {
        let project = self.current_project()?;
        let path = absolute(path);
        if !self.db.remove_selection(project.id, &path.to_string_lossy())? {
            bail!("Not selected: {}", path.display());
        }
        println!("Unselected {}", path.display());
        Ok(())
    }

    pub fn assign(&self, path: &Path, category: Option<&str>) -> Result<()> {
        let project = self.current_project()?;
        let category = self.category_named(&project, category)?;
        let path = absolute(path);

        let updated = self.db.set_selection_category(
            project.id,
            &path.to_string_lossy(),
            category.as_ref().map(|c| c.id),
        )?;
        if !updated {
            bail!("Not selected: {}", path.display());
        }
        match category {
            Some(category) => println!("Assigned {} to {}", path.display(), category.name),
            None => println!("Uncategorized {}", path.display()),
        }
        Ok(())
    }

    pub fn list(&self) -> Result<()> {
        let project = self.current_project()?;
        let categories = self.db.get_categories(project.id)?;
        let root = Path::new(&project.root_path);

        let mut lines: Vec<String> = self
            .db
            .get_selections(project.id, None)?
            .iter()
            .map(|selection| {
                let category = selection
                    .category_id
                    .and_then(|id| categories.iter().find(|c| c.id == id))
                    .map(|c| c.name.as_str());
                describe_selection(root, selection, category)
            })
            .collect();
        lines.sort_by_key(|line| line.to_lowercase());

        if lines.is_empty() {
            println!("No selections in {}", project.name);
        }
        for line in lines {
            println!("{line}");
        }
        Ok(())
    }

    // ============================================================
    // Output
    // ============================================================

    pub fn tree(&self, category: Option<&str>) -> Result<()> {
        let project = self.current_project()?;
        let category = self.category_named(&project, category)?;
        let selections = self
            .db
            .get_selections(project.id, category.map(|c| c.id))?;

        let tree = context::render_tree(
            Path::new(&project.root_path),
            &selections,
            &self.settings.engine_options(),
        );
        println!("{STRUCTURE_HEADER}\n{tree}\n{STRUCTURE_FOOTER}");
        Ok(())
    }

    pub fn preview(&self, path: &Path) {
        let path = absolute(path);
        println!("{}", context::preview(&path, &self.settings.engine_options()));
    }

    pub async fn drop_artifact(&self, category: Option<&str>, timeout: Option<u64>) -> Result<()> {
        let project = self.current_project()?;
        let category = self.category_named(&project, category)?;
        let options = self.settings.engine_options();

        let (target, artifact) = drop_context_within(
            &self.db,
            &FsArtifactWriter,
            project.id,
            category.map(|c| c.id),
            &options,
            timeout.map(Duration::from_secs),
        )
        .await
        .with_context(|| format!("Failed to generate context for {}", project.name))?;

        tracing::info!(
            "Included {} files in {}",
            artifact.included_files,
            target.display()
        );
        if !artifact.warnings.is_empty() {
            eprintln!(
                "{} selected path(s) not found; see warnings in {}",
                artifact.warnings.len(),
                target.display()
            );
        }
        println!("{}", project.prompt_guide);
        Ok(())
    }
}

/// Absolute, lexically normalized form of a path given on the command line.
fn absolute(path: &Path) -> PathBuf {
    PathKey::new(path).path().to_path_buf()
}
