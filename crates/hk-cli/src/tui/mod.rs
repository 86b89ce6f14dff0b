mod app;
mod view;

use hk_core::change::ChangeRecord;

/// Run the interactive review list. Returns the records with the user's
/// selection, or `None` if they backed out.
pub fn run_review(records: Vec<ChangeRecord>) -> color_eyre::Result<Option<Vec<ChangeRecord>>> {
    app::run_review(records)
}
