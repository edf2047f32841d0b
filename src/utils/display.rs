use crate::records::{Message, Role};
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.chars().count()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_warning(text: &str) {
    eprintln!("{}", text.yellow());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{}:", label).bold(), value);
}

pub fn print_message(index: usize, message: &Message) {
    let role = match message.role {
        Role::User => message.role.to_string().yellow().bold(),
        Role::Assistant => message.role.to_string().magenta().bold(),
    };
    println!("{:>3}. {} {}", index + 1, role, message.content);
    for image in &message.images {
        println!("     {} {}", "image:".dimmed(), image);
    }
}
