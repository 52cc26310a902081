use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.chars().count()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_warning(text: &str) {
    eprintln!("{}", text.yellow());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
}

pub fn print_turn(speaker: &str, text: &str) {
    println!("{} {}", format!("{}:", speaker).bold(), text);
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_helpers_are_reachable_from_utils() {
        crate::utils::print_header("Conversations");
        crate::utils::print_success("saved");
        crate::utils::print_warning("retrying");
        crate::utils::print_error("failed");
        crate::utils::print_info("no conversations yet");
        crate::utils::print_prompt("You: ");
        crate::utils::print_turn("Tutor", "Bonjour !");
    }
}
