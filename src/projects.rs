use ratatui::widgets::ListState;

/// Fixed categories attached to every project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Slides,
    Captions,
    Uploads,
    Comments,
}

impl Category {
    pub fn all() -> [Category; 4] {
        [
            Category::Slides,
            Category::Captions,
            Category::Uploads,
            Category::Comments,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Slides => "Slides",
            Category::Captions => "Captions",
            Category::Uploads => "Uploads",
            Category::Comments => "Comments",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Category::Slides => "slides",
            Category::Captions => "captions",
            Category::Uploads => "uploads",
            Category::Comments => "comments",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    pub key: String,
    pub name: String,
}

/// One visible row of the sidebar: a project header, or a category under
/// the expanded project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarRow {
    Project(usize),
    Category(usize, Category),
}

/// Derive a project key from a display name: lowercase, whitespace
/// collapsed to underscores.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Recover a display name from a bare key: separators to spaces, words
/// capitalized.
pub fn unslugify(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sidebar state: the project list, the accordion (at most one project
/// expanded), and the active `(project, category)` selection.
pub struct ProjectTree {
    pub projects: Vec<Project>,
    pub open: Option<String>,
    pub active: Option<(String, Category)>,
    pub list_state: ListState,
}

impl ProjectTree {
    pub fn new(default_keys: &[&str]) -> Self {
        let projects = default_keys
            .iter()
            .map(|key| Project {
                key: key.to_string(),
                name: unslugify(key),
            })
            .collect();
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            projects,
            open: None,
            active: None,
            list_state,
        }
    }

    /// Replace the project list with keys fetched from the backend,
    /// un-slugifying bare identifiers into display names. The open and
    /// active selections survive when their project still exists.
    pub fn apply_loaded(&mut self, raw: Vec<String>) {
        if raw.is_empty() {
            return;
        }
        self.projects = raw
            .into_iter()
            .map(|entry| {
                let key = slugify(&entry);
                let name = if entry == key { unslugify(&entry) } else { entry };
                Project { key, name }
            })
            .collect();
        if let Some(open) = self.open.clone() {
            if !self.contains(&open) {
                self.open = None;
            }
        }
        if let Some((project, _)) = self.active.clone() {
            if !self.contains(&project) {
                self.active = None;
            }
        }
        let row_count = self.rows().len();
        if self.list_state.selected().unwrap_or(0) >= row_count {
            self.list_state.select(if row_count > 0 { Some(0) } else { None });
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.projects.iter().any(|p| p.key == key)
    }

    /// Append a project after a successful create. No-op if the key is
    /// already present.
    pub fn insert_created(&mut self, name: String, key: String) {
        if !self.contains(&key) {
            self.projects.push(Project { key, name });
        }
    }

    /// Accordion toggle: expanding a project collapses the previous one.
    pub fn toggle(&mut self, key: &str) {
        if self.open.as_deref() == Some(key) {
            self.open = None;
        } else {
            self.open = Some(key.to_string());
        }
    }

    pub fn open_if_present(&mut self, key: &str) {
        if self.contains(key) {
            self.open = Some(key.to_string());
        }
    }

    pub fn select(&mut self, key: &str, category: Category) {
        self.active = Some((key.to_string(), category));
    }

    /// Composite key shared with the conversation store and status panel.
    pub fn active_key(&self) -> Option<String> {
        self.active
            .as_ref()
            .map(|(project, category)| format!("{}/{}", project, category.slug()))
    }

    pub fn active_project(&self) -> Option<&str> {
        self.active
            .as_ref()
            .map(|(project, _)| project.as_str())
            .or(self.open.as_deref())
    }

    /// Flattened visible rows: every project, plus the categories of the
    /// expanded one.
    pub fn rows(&self) -> Vec<SidebarRow> {
        let mut rows = Vec::new();
        for (idx, project) in self.projects.iter().enumerate() {
            rows.push(SidebarRow::Project(idx));
            if self.open.as_deref() == Some(project.key.as_str()) {
                for category in Category::all() {
                    rows.push(SidebarRow::Category(idx, category));
                }
            }
        }
        rows
    }

    pub fn selected_row(&self) -> Option<SidebarRow> {
        let rows = self.rows();
        self.list_state.selected().and_then(|i| rows.get(i).cloned())
    }

    pub fn nav_down(&mut self) {
        let len = self.rows().len();
        if len > 0 {
            let i = self.list_state.selected().unwrap_or(0);
            self.list_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn nav_up(&mut self) {
        let i = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(i.saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_whitespace() {
        assert_eq!(slugify("My Brand"), "my_brand");
        assert_eq!(slugify("  Tradeview   AI "), "tradeview_ai");
        assert_eq!(slugify("remote100k"), "remote100k");
    }

    #[test]
    fn unslugify_capitalizes_words() {
        assert_eq!(unslugify("my_brand"), "My Brand");
        assert_eq!(unslugify("tradeview-ai"), "Tradeview Ai");
        assert_eq!(unslugify("remote100k"), "Remote100k");
    }

    #[test]
    fn toggle_is_an_accordion() {
        let mut tree = ProjectTree::new(&["remote100k", "app_304"]);
        tree.toggle("remote100k");
        assert_eq!(tree.open.as_deref(), Some("remote100k"));
        tree.toggle("app_304");
        assert_eq!(tree.open.as_deref(), Some("app_304"));
        tree.toggle("app_304");
        assert!(tree.open.is_none());
    }

    #[test]
    fn rows_expand_only_the_open_project() {
        let mut tree = ProjectTree::new(&["remote100k", "app_304"]);
        assert_eq!(tree.rows().len(), 2);
        tree.toggle("remote100k");
        let rows = tree.rows();
        assert_eq!(rows.len(), 2 + Category::all().len());
        assert_eq!(rows[0], SidebarRow::Project(0));
        assert_eq!(rows[1], SidebarRow::Category(0, Category::Slides));
    }

    #[test]
    fn apply_loaded_unslugifies_bare_keys() {
        let mut tree = ProjectTree::new(&[]);
        tree.apply_loaded(vec!["my_brand".to_string(), "My Shop".to_string()]);
        assert_eq!(tree.projects[0].key, "my_brand");
        assert_eq!(tree.projects[0].name, "My Brand");
        assert_eq!(tree.projects[1].key, "my_shop");
        assert_eq!(tree.projects[1].name, "My Shop");
    }

    #[test]
    fn apply_loaded_drops_vanished_selection() {
        let mut tree = ProjectTree::new(&["remote100k"]);
        tree.toggle("remote100k");
        tree.select("remote100k", Category::Slides);
        tree.apply_loaded(vec!["app_304".to_string()]);
        assert!(tree.open.is_none());
        assert!(tree.active.is_none());
    }

    #[test]
    fn insert_created_dedupes_by_key() {
        let mut tree = ProjectTree::new(&["remote100k"]);
        tree.insert_created("My Brand".to_string(), "my_brand".to_string());
        tree.insert_created("My Brand".to_string(), "my_brand".to_string());
        assert_eq!(tree.projects.len(), 2);
    }

    #[test]
    fn active_key_is_project_slash_category() {
        let mut tree = ProjectTree::new(&["remote100k"]);
        tree.select("remote100k", Category::Captions);
        assert_eq!(tree.active_key().as_deref(), Some("remote100k/captions"));
    }
}
