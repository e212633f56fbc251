use crate::output::{print_json, print_table};
use dbiloc_core::catalog::scan_translations;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = super::load_config(root)?;
    let languages = scan_translations(&cfg);

    if json {
        let items: Vec<serde_json::Value> = languages
            .iter()
            .map(|(code, path)| serde_json::json!({ "code": code, "path": path }))
            .collect();
        return print_json(&items);
    }

    if languages.is_empty() {
        println!(
            "No translation files found in {}",
            cfg.translations_dir().display()
        );
        return Ok(());
    }

    let rows: Vec<Vec<String>> = languages
        .iter()
        .map(|(code, path)| vec![code.clone(), path.display().to_string()])
        .collect();
    print_table(&["CODE", "FILE"], &rows);
    Ok(())
}
