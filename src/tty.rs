use is_terminal::IsTerminal;

/// Color stdout only for an interactive terminal, and never when `NO_COLOR` is set.
pub fn should_use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}
