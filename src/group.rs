use tracing::{debug, trace};

use crate::domain::ViewerError;
use crate::table::RenderedTable;

pub const TABLES_PER_GROUP: usize = 2;

/// Two tables sharing one collapse control. The second table may arrive
/// later; once both are present the group is sealed.
#[derive(Debug, Default)]
pub struct TableGroup {
    pub tables: Vec<RenderedTable>,
    pub collapsed: bool,
}

/// Owns the placement counter and the group list. Tables are assigned to
/// groups of two in arrival order: the counter cycles 0 -> 1 -> 0, a new
/// group (and its collapse control) opens on 0, the table on 1 joins the
/// most recent group. The counter is instance state, not module state, so
/// independent sessions do not interfere.
#[derive(Debug, Default)]
pub struct GroupController {
    table_count: usize,
    pub groups: Vec<TableGroup>,
}

impl GroupController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place_table(&mut self, table: RenderedTable) -> Result<(), ViewerError> {
        if self.table_count == 0 {
            debug!("Opening group {} for table \"{}\"", self.groups.len(), table.id);
            self.groups.push(TableGroup {
                tables: vec![table],
                collapsed: false,
            });
        } else {
            let group_idx = self.groups.len().wrapping_sub(1);
            let group = self.groups.last_mut().ok_or_else(|| {
                ViewerError::InvariantViolation(
                    "placement counter says 1 but no group container exists".to_string(),
                )
            })?;
            debug!("Placing table \"{}\" into group {}", table.id, group_idx);
            group.tables.push(table);
        }
        self.table_count = (self.table_count + 1) % TABLES_PER_GROUP;
        Ok(())
    }

    pub fn toggle_collapse(&mut self, group_idx: usize) {
        if let Some(group) = self.groups.get_mut(group_idx) {
            group.collapsed = !group.collapsed;
            trace!("Group {} collapsed: {}", group_idx, group.collapsed);
        }
    }

    /// The global reset: every Hidden row in every table of every group
    /// back to Normal. Returns how many rows were restored.
    pub fn reset_hidden(&mut self) -> usize {
        let mut reset = 0;
        for group in &mut self.groups {
            for table in &mut group.tables {
                reset += table.reset_hidden();
            }
        }
        debug!("Reset {} hidden rows", reset);
        reset
    }
}
