use console::style;
use tandem_core::{ChatEntry, Role};
use termimad::MadSkin;

pub fn print_entries(entries: &[ChatEntry]) {
    let skin = MadSkin::default();
    for entry in entries {
        print_entry(&skin, entry);
    }
}

fn print_entry(skin: &MadSkin, entry: &ChatEntry) {
    let header = format!("~ {} ({})", entry.sender, entry.role());
    if entry.include_in_chat {
        println!("{}", style(header).cyan().bold());
    } else {
        println!("{} {}", style(header).dim(), style("[merged]").dim());
    }

    match entry.role() {
        Role::Assistant if entry.include_in_chat => {
            println!("{}", skin.term_text(entry.content()));
        }
        _ => println!("{}", style(entry.content().trim()).dim()),
    }
    println!("{}", style("-----------").dim());
}
