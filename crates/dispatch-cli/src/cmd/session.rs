use crate::output::print_json;
use dispatch_core::session;
use dispatch_core::store;
use std::path::Path;

pub fn use_list(root: &Path, list: &str, json: bool) -> anyhow::Result<()> {
    session::set_current(root, list)?;
    if json {
        print_json(&serde_json::json!({ "current": list }))?;
    } else {
        println!("Current list: {list}");
        println!("Workers inherit it via {}={list}", session::LIST_ENV);
    }
    Ok(())
}

pub fn current(root: &Path, json: bool) -> anyhow::Result<()> {
    let current = session::current(root)?;
    if json {
        print_json(&serde_json::json!({ "current": current }))?;
        return Ok(());
    }
    match current {
        Some(list) => println!("{list}"),
        None => println!("No current list. Run 'dispatch use <list>'."),
    }
    Ok(())
}

pub fn lists(root: &Path, json: bool) -> anyhow::Result<()> {
    let lists = store::lists(root)?;
    if json {
        print_json(&lists)?;
        return Ok(());
    }
    if lists.is_empty() {
        println!("No lists.");
        return Ok(());
    }
    let current = session::current(root)?;
    for list in lists {
        let marker = if current.as_deref() == Some(list.as_str()) {
            "* "
        } else {
            "  "
        };
        println!("{marker}{list}");
    }
    Ok(())
}
