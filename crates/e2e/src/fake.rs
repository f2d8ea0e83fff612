//! In-memory ERP behind a [`DomSurface`]
//!
//! Renders the screens the engine drives (nested BOM modals, detail
//! characteristics, the material catalog, the specification edit dialog and
//! the main specification page) using the markup the default
//! [`EngineConfig`](bomwalk_engine::EngineConfig) selectors expect.
//!
//! The edit dialog works on the live specification: its staged table is the
//! category's content, removals and quantity edits apply at once, and commit
//! or cancel only close the dialog. Commit is enabled while the staged table
//! has rows.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::debug;

use bomwalk_engine::model::{format_quantity, parse_quantity};
use bomwalk_engine::{
    Category, DesiredItem, DomSurface, ElementHandle, Error, Result, TargetSpecification,
};

use crate::fixture::{default_label, Fixture, FixtureGroup};
use crate::page::{flatten, Node, Selector};

/// Material catalog tabs in display order
pub const MATERIAL_TABS: [(&str, Category); 3] = [
    ("catalog-tab-raw", Category::RawMaterial),
    ("catalog-tab-standard", Category::StandardPart),
    ("catalog-tab-consumable", Category::Consumable),
];

/// What activating an element does
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    OpenLevel { designation: String },
    CloseLevel { depth: usize },
    OpenDetail { material: Option<String> },
    CloseDetail,
    OpenCatalog,
    CloseCatalog,
    CatalogTab(usize),
    OpenDialog(Category),
    SelectCandidate(usize),
    SelectStaged(usize),
    EditQuantity(usize),
    Stage,
    Remove,
    Commit,
    Cancel,
}

/// Inputs that accept typed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    CatalogSearch,
    DialogSearch,
    Quantity(usize),
}

#[derive(Debug, Default)]
struct CatalogPanel {
    tab: usize,
    typed: String,
    query: String,
}

#[derive(Debug)]
struct Dialog {
    category: Category,
    typed: String,
    query: String,
    selected: Option<usize>,
    selected_staged: Option<usize>,
    editing: Option<(usize, String)>,
}

impl Dialog {
    fn new(category: Category) -> Self {
        Self {
            category,
            typed: String::new(),
            query: String::new(),
            selected: None,
            selected_staged: None,
            editing: None,
        }
    }
}

#[derive(Debug)]
struct ErpState {
    fixture: Fixture,
    specification: TargetSpecification,
    levels: Vec<String>,
    detail: Option<Option<String>>,
    catalog: Option<CatalogPanel>,
    dialog: Option<Dialog>,
    jam_removal: bool,
    jam_quantity: bool,
    journal: Vec<String>,
}

/// Fake ERP application
pub struct FakeErp {
    state: Mutex<ErpState>,
}

fn filtered<'a>(names: &'a [String], query: &str) -> Vec<&'a String> {
    let query = query.trim().to_lowercase();
    names
        .iter()
        .filter(|n| query.is_empty() || n.to_lowercase().contains(&query))
        .collect()
}

fn header_cell(column: &str, label: &str) -> Node {
    Node::new("th").attr("data-column-id", column).text(label)
}

fn cell(text: impl Into<String>) -> Node {
    Node::new("td").text(text)
}

impl FakeErp {
    pub fn new(fixture: Fixture) -> Self {
        let specification = fixture.specification.clone();
        Self {
            state: Mutex::new(ErpState {
                fixture,
                specification,
                levels: Vec::new(),
                detail: None,
                catalog: None,
                dialog: None,
                jam_removal: false,
                jam_quantity: false,
                journal: Vec::new(),
            }),
        }
    }

    /// Current content of the main specification
    pub fn specification(&self) -> TargetSpecification {
        self.state.lock().specification.clone()
    }

    /// Every action applied so far, oldest first
    pub fn journal(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    /// Make the dialog's remove button do nothing
    pub fn jam_removal(&self, jammed: bool) {
        self.state.lock().jam_removal = jammed;
    }

    /// Make double-clicking a quantity cell open no editor
    pub fn jam_quantity_edit(&self, jammed: bool) {
        self.state.lock().jam_quantity = jammed;
    }

    pub fn dialog_open(&self) -> bool {
        self.state.lock().dialog.is_some()
    }

    /// Number of BOM modals currently stacked
    pub fn open_levels(&self) -> usize {
        self.state.lock().levels.len()
    }

    fn locate<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(&[crate::page::Flat<'_>], usize) -> T,
    ) -> Result<T> {
        let state = self.state.lock();
        let root = state.render();
        let flat = flatten(&root);
        let index = flat
            .iter()
            .position(|e| e.path == handle.id())
            .ok_or_else(|| Error::Dom(format!("stale element {}", handle)))?;
        Ok(f(&flat, index))
    }

    /// Action of the element or its nearest ancestor that has one
    fn activate(&self, handle: &ElementHandle, double: bool) -> Result<()> {
        let action = self.locate(handle, |flat, index| {
            if !flat[index].node.enabled {
                return None;
            }
            let mut current = Some(index);
            while let Some(i) = current {
                let node = flat[i].node;
                let action = if double {
                    &node.on_double_click
                } else {
                    &node.on_click
                };
                if action.is_some() {
                    return action.clone();
                }
                current = flat[i].parent;
            }
            None
        })?;

        match action {
            Some(action) => self.state.lock().apply(action),
            None => debug!("Activating {} has no effect", handle),
        }
        Ok(())
    }

    fn field(&self, handle: &ElementHandle) -> Result<Field> {
        self.locate(handle, |flat, index| flat[index].node.field)?
            .ok_or_else(|| Error::Dom(format!("{} is not an input", handle)))
    }
}

impl ErpState {
    fn apply(&mut self, action: Action) {
        self.journal.push(format!("{:?}", action));

        match action {
            Action::OpenLevel { designation } => {
                if self.fixture.levels.contains_key(&designation) {
                    self.levels.push(designation);
                } else {
                    debug!("No sub-specification for {}", designation);
                }
            }
            Action::CloseLevel { depth } => self.levels.truncate(depth.saturating_sub(1)),
            Action::OpenDetail { material } => self.detail = Some(material),
            Action::CloseDetail => self.detail = None,
            Action::OpenCatalog => self.catalog = Some(CatalogPanel::default()),
            Action::CloseCatalog => self.catalog = None,
            Action::CatalogTab(tab) => {
                if let Some(panel) = &mut self.catalog {
                    *panel = CatalogPanel {
                        tab,
                        ..Default::default()
                    };
                }
            }
            Action::OpenDialog(category) => {
                if self.dialog.is_none() {
                    self.dialog = Some(Dialog::new(category));
                }
            }
            Action::SelectCandidate(i) => {
                if let Some(dialog) = &mut self.dialog {
                    dialog.selected = Some(i);
                }
            }
            Action::SelectStaged(i) => {
                if let Some(dialog) = &mut self.dialog {
                    dialog.selected_staged = Some(i);
                }
            }
            Action::EditQuantity(_) if self.jam_quantity => {}
            Action::EditQuantity(i) => {
                let Some(dialog) = &self.dialog else { return };
                let current = self
                    .specification
                    .items(dialog.category)
                    .get(i)
                    .map(|item| format_quantity(item.quantity_or_default()));
                if let (Some(current), Some(dialog)) = (current, &mut self.dialog) {
                    dialog.editing = Some((i, current));
                }
            }
            Action::Stage => self.stage(),
            Action::Remove => self.remove(),
            Action::Commit | Action::Cancel => self.dialog = None,
        }
    }

    fn stage(&mut self) {
        let Some(dialog) = &mut self.dialog else { return };
        let Some(selected) = dialog.selected.take() else { return };

        let names = self
            .fixture
            .catalog
            .get(&dialog.category)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let Some(name) = filtered(names, &dialog.query).get(selected).map(|n| n.to_string())
        else {
            return;
        };

        if let Some(list) = self.specification.items_mut(dialog.category) {
            list.push(DesiredItem::new(name, 1.0));
        }
    }

    fn remove(&mut self) {
        if self.jam_removal {
            return;
        }
        let Some(dialog) = &mut self.dialog else { return };
        let Some(index) = dialog.selected_staged.take() else { return };

        if let Some(list) = self.specification.items_mut(dialog.category) {
            if index < list.len() {
                list.remove(index);
            }
        }
    }

    fn set_value(&mut self, field: Field, value: &str) {
        match field {
            Field::CatalogSearch => {
                if let Some(panel) = &mut self.catalog {
                    panel.typed = value.to_string();
                }
            }
            Field::DialogSearch => {
                if let Some(dialog) = &mut self.dialog {
                    dialog.typed = value.to_string();
                }
            }
            Field::Quantity(i) => {
                if let Some(dialog) = &mut self.dialog {
                    if let Some((row, buffer)) = &mut dialog.editing {
                        if *row == i {
                            *buffer = value.to_string();
                        }
                    }
                }
            }
        }
    }

    fn press(&mut self, field: Field, key: &str) {
        self.journal.push(format!("Press({:?}, {})", field, key));

        match (field, key) {
            (Field::CatalogSearch, "Enter") => {
                if let Some(panel) = &mut self.catalog {
                    panel.query = panel.typed.clone();
                }
            }
            (Field::DialogSearch, "Enter") => {
                if let Some(dialog) = &mut self.dialog {
                    dialog.query = dialog.typed.clone();
                    dialog.selected = None;
                }
            }
            (Field::Quantity(_), "Escape") => {
                if let Some(dialog) = &mut self.dialog {
                    dialog.editing = None;
                }
            }
            (Field::Quantity(i), "Enter") => {
                let Some(dialog) = &mut self.dialog else { return };
                let Some((row, buffer)) = dialog.editing.take() else { return };
                if row != i {
                    return;
                }
                let Some(quantity) = parse_quantity(&buffer) else {
                    debug!("Rejected quantity '{}'", buffer);
                    return;
                };
                if let Some(item) = self
                    .specification
                    .items_mut(dialog.category)
                    .and_then(|list| list.get_mut(i))
                {
                    item.quantity = Some(quantity);
                }
            }
            _ => {}
        }
    }

    fn render(&self) -> Node {
        let mut body = Node::new("body")
            .child(
                Node::new("section")
                    .attr("data-testid", "bom-root")
                    .child(self.bom_table(&self.fixture.product, 0)),
            )
            .child(self.render_specification())
            .child(self.render_toolbar());

        for (i, designation) in self.levels.iter().enumerate() {
            let depth = i + 1;
            body = body.child(
                Node::new("div")
                    .attr("data-testid", "bom-modal")
                    .attr("data-depth", depth.to_string())
                    .child(
                        Node::new("span")
                            .attr("data-field", "designation")
                            .text(designation.clone()),
                    )
                    .child(self.bom_table(designation, depth))
                    .child(
                        Node::new("button")
                            .attr("data-action", "close")
                            .text("Close")
                            .on_click(Action::CloseLevel { depth }),
                    ),
            );
        }

        if let Some(material) = &self.detail {
            let mut modal = Node::new("div").attr("data-testid", "detail-modal");
            if let Some(material) = material {
                modal = modal.child(
                    Node::new("span")
                        .attr("data-characteristic", "material")
                        .text(material.clone()),
                );
            }
            body = body.child(
                modal.child(
                    Node::new("button")
                        .attr("data-action", "close")
                        .on_click(Action::CloseDetail),
                ),
            );
        }

        if let Some(panel) = &self.catalog {
            body = body.child(self.render_catalog(panel));
        }

        if let Some(dialog) = &self.dialog {
            body = body.child(self.render_dialog(dialog));
        }

        Node::new("#document").child(body)
    }

    fn bom_table(&self, designation: &str, depth: usize) -> Node {
        let groups: &[FixtureGroup] = self
            .fixture
            .levels
            .get(designation)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let head = Node::new("thead")
            .child(
                Node::new("tr")
                    .child(header_cell("position", "#"))
                    .child(header_cell("identity", "Item").attr("colspan", "2"))
                    .child(header_cell("unit", "Unit"))
                    .child(header_cell("quantity", "Qty")),
            )
            .child(
                Node::new("tr")
                    .child(header_cell("designation", "Designation"))
                    .child(header_cell("name", "Name")),
            )
            .child(
                Node::new("tr")
                    .attr("data-row-id", "search-row")
                    .child(header_cell("search", "").attr("colspan", "5")),
            );

        let mut body = Node::new("tbody");
        let mut position = 0;
        for group in groups {
            let label = group.label();
            body = body.child(
                Node::new("tr")
                    .attr("data-row-kind", "group")
                    .attr("data-group", label.clone())
                    .child(cell(label).attr("colspan", "5")),
            );

            for item in &group.items {
                position += 1;
                let mut row = Node::new("tr")
                    .attr("data-row-kind", "data")
                    .child(cell(position.to_string()))
                    .child(cell(item.designation.clone()))
                    .child(cell(item.name.clone()))
                    .child(cell(item.unit.clone()))
                    .child(cell(item.quantity.clone()));

                match group.category {
                    Some(Category::Assembly) => {
                        row = row.on_click(Action::OpenLevel {
                            designation: item.designation.clone(),
                        });
                    }
                    Some(Category::Detail) => {
                        row = row.on_click(Action::OpenDetail {
                            material: item.material.clone(),
                        });
                    }
                    _ => {}
                }
                body = body.child(row);
            }
        }

        Node::new("table")
            .class("specification")
            .attr("data-depth", depth.to_string())
            .child(head)
            .child(body)
    }

    fn render_specification(&self) -> Node {
        let head = Node::new("thead").child(
            Node::new("tr")
                .child(header_cell("name", "Name"))
                .child(header_cell("quantity", "Qty")),
        );

        let mut body = Node::new("tbody");
        for category in TargetSpecification::EDITABLE {
            let lines = self.specification.items(category).iter().map(|item| {
                Node::new("tr")
                    .child(cell(item.name.clone()))
                    .child(cell(format_quantity(item.quantity_or_default())))
            });

            body = body
                .child(
                    Node::new("tr")
                        .attr("data-row-kind", "group")
                        .child(cell(default_label(category))),
                )
                .child(
                    Node::new("tr").attr("data-row-kind", "data").child(
                        Node::new("td").child(
                            Node::new("table").child(Node::new("tbody").children(lines)),
                        ),
                    ),
                );
        }

        Node::new("section")
            .attr("data-testid", "specification")
            .child(Node::new("table").class("groups").child(head).child(body))
    }

    fn render_toolbar(&self) -> Node {
        let edit_buttons = TargetSpecification::EDITABLE.into_iter().map(|category| {
            Node::new("button")
                .attr("data-testid", format!("edit-{}", category.as_str()))
                .on_click(Action::OpenDialog(category))
        });

        Node::new("div")
            .class("toolbar")
            .children(edit_buttons)
            .child(
                Node::new("button")
                    .attr("data-testid", "material-catalog-open")
                    .on_click(Action::OpenCatalog),
            )
    }

    fn render_catalog(&self, panel: &CatalogPanel) -> Node {
        let tabs = MATERIAL_TABS.iter().enumerate().map(|(i, (testid, _))| {
            let tab = Node::new("button")
                .attr("data-testid", *testid)
                .on_click(Action::CatalogTab(i));
            if i == panel.tab {
                tab.class("active")
            } else {
                tab
            }
        });

        let category = MATERIAL_TABS[panel.tab.min(MATERIAL_TABS.len() - 1)].1;
        let names = self
            .fixture
            .materials
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let rows = filtered(names, &panel.query).into_iter().map(|name| {
            Node::new("tr")
                .child(cell(name.clone()))
                .child(cell(default_label(category)))
        });

        Node::new("div")
            .attr("data-testid", "material-catalog")
            .children(tabs)
            .child(
                Node::new("input")
                    .attr("type", "search")
                    .field(Field::CatalogSearch, &panel.typed),
            )
            .child(
                Node::new("table")
                    .child(
                        Node::new("thead").child(
                            Node::new("tr")
                                .child(header_cell("name", "Name"))
                                .child(header_cell("group", "Group")),
                        ),
                    )
                    .child(Node::new("tbody").children(rows)),
            )
            .child(
                Node::new("button")
                    .attr("data-action", "close")
                    .on_click(Action::CloseCatalog),
            )
    }

    fn render_dialog(&self, dialog: &Dialog) -> Node {
        let names = self
            .fixture
            .catalog
            .get(&dialog.category)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let candidates = filtered(names, &dialog.query)
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let row = Node::new("tr")
                    .child(cell(name.clone()))
                    .child(cell("pcs"))
                    .on_click(Action::SelectCandidate(i));
                if dialog.selected == Some(i) {
                    row.class("selected")
                } else {
                    row
                }
            });

        let staged_items = self.specification.items(dialog.category);
        let staged = staged_items.iter().enumerate().map(|(i, item)| {
            let quantity = match &dialog.editing {
                Some((row, buffer)) if *row == i => Node::new("td")
                    .child(Node::new("input").attr("type", "number").field(Field::Quantity(i), buffer)),
                _ => cell(format_quantity(item.quantity_or_default())),
            };
            Node::new("tr")
                .on_click(Action::SelectStaged(i))
                .child(cell(item.name.clone()))
                .child(quantity.on_double_click(Action::EditQuantity(i)))
        });

        Node::new("div")
            .attr("data-testid", "spec-dialog")
            .attr("data-category", dialog.category.as_str())
            .child(
                Node::new("input")
                    .attr("type", "search")
                    .field(Field::DialogSearch, &dialog.typed),
            )
            .child(
                Node::new("div").attr("data-testid", "catalog").child(
                    Node::new("table")
                        .child(
                            Node::new("thead").child(
                                Node::new("tr")
                                    .child(header_cell("name", "Name"))
                                    .child(header_cell("unit", "Unit")),
                            ),
                        )
                        .child(Node::new("tbody").children(candidates)),
                ),
            )
            .child(
                Node::new("button")
                    .attr("data-action", "stage")
                    .on_click(Action::Stage),
            )
            .child(
                Node::new("div").attr("data-testid", "staged").child(
                    Node::new("table")
                        .child(
                            Node::new("thead").child(
                                Node::new("tr")
                                    .child(header_cell("name", "Name"))
                                    .child(header_cell("quantity", "Qty")),
                            ),
                        )
                        .child(Node::new("tbody").children(staged)),
                ),
            )
            .child(
                Node::new("button")
                    .attr("data-action", "remove")
                    .on_click(Action::Remove),
            )
            .child(
                Node::new("button")
                    .attr("data-action", "commit")
                    .enabled(!staged_items.is_empty())
                    .on_click(Action::Commit),
            )
            .child(
                Node::new("button")
                    .attr("data-action", "cancel")
                    .on_click(Action::Cancel),
            )
    }
}

fn timeout(what: impl std::fmt::Display, timeout: Duration) -> Error {
    Error::Timeout {
        what: what.to_string(),
        millis: timeout.as_millis() as u64,
    }
}

#[async_trait]
impl DomSurface for FakeErp {
    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let selector = Selector::parse(selector)?;
        let state = self.state.lock();
        let root = state.render();
        let flat = flatten(&root);
        Ok(selector
            .query(&flat, 0)
            .into_iter()
            .map(|i| ElementHandle::new(flat[i].path.clone()))
            .collect())
    }

    async fn find_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>> {
        let selector = Selector::parse(selector)?;
        self.locate(parent, |flat, index| {
            selector
                .query(flat, index)
                .into_iter()
                .map(|i| ElementHandle::new(flat[i].path.clone()))
                .collect()
        })
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        self.locate(element, |flat, index| flat[index].node.text_content())
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        self.locate(element, |flat, index| flat[index].node.attrs.get(name).cloned())
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.activate(element, false)
    }

    async fn double_click(&self, element: &ElementHandle) -> Result<()> {
        self.activate(element, true)
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<()> {
        let field = self.field(element)?;
        self.state.lock().set_value(field, value);
        Ok(())
    }

    async fn press(&self, element: &ElementHandle, key: &str) -> Result<()> {
        let field = self.field(element)?;
        self.state.lock().press(field, key);
        Ok(())
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool> {
        self.locate(element, |flat, index| flat[index].node.enabled)
    }

    async fn wait_visible(&self, element: &ElementHandle, wait: Duration) -> Result<()> {
        self.locate(element, |_, _| ())
            .map_err(|_| timeout(element, wait))
    }

    async fn wait_hidden(&self, element: &ElementHandle, wait: Duration) -> Result<()> {
        match self.locate(element, |_, _| ()) {
            Ok(()) => Err(timeout(format!("{} to hide", element), wait)),
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureItem;
    use bomwalk_engine::dom::find_first;

    fn fixture() -> Fixture {
        let mut fixture = Fixture {
            product: "P-1".to_string(),
            ..Default::default()
        };
        fixture.levels.insert(
            "P-1".to_string(),
            vec![FixtureGroup::new(
                Category::Assembly,
                vec![FixtureItem::new("A-1", "Frame", "2")],
            )],
        );
        fixture.levels.insert("A-1".to_string(), Vec::new());
        fixture
            .catalog
            .insert(Category::Consumable, vec!["Primer".to_string(), "Paint".to_string()]);
        fixture
    }

    #[tokio::test]
    async fn test_clicking_a_cell_bubbles_to_its_row() {
        let erp = FakeErp::new(fixture());
        let cell = find_first(&erp, "[data-testid='bom-root'] tbody > tr[data-row-kind='data'] > td")
            .await
            .unwrap();

        erp.click(&cell).await.unwrap();
        assert_eq!(erp.open_levels(), 1);
        assert_eq!(
            erp.find_all("[data-testid='bom-modal'][data-depth='1']")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_dialog_search_filters_on_enter() {
        let erp = FakeErp::new(fixture());
        let open = find_first(&erp, "[data-testid='edit-consumable']").await.unwrap();
        erp.click(&open).await.unwrap();

        let search = find_first(&erp, "[data-testid='spec-dialog'] input[type='search']")
            .await
            .unwrap();
        erp.set_value(&search, "prim").await.unwrap();
        let rows = "[data-testid='catalog'] tbody > tr";
        assert_eq!(erp.find_all(rows).await.unwrap().len(), 2);

        erp.press(&search, "Enter").await.unwrap();
        assert_eq!(erp.find_all(rows).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_commit_does_nothing() {
        let erp = FakeErp::new(fixture());
        let open = find_first(&erp, "[data-testid='edit-consumable']").await.unwrap();
        erp.click(&open).await.unwrap();

        let commit = find_first(&erp, "[data-action='commit']").await.unwrap();
        assert!(!erp.is_enabled(&commit).await.unwrap());
        erp.click(&commit).await.unwrap();
        assert!(erp.dialog_open());
    }

    #[tokio::test]
    async fn test_set_value_rejects_non_inputs() {
        let erp = FakeErp::new(fixture());
        let button = find_first(&erp, "[data-testid='material-catalog-open']")
            .await
            .unwrap();
        assert!(erp.set_value(&button, "x").await.is_err());
    }
}
