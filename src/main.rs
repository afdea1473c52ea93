//! plug - command line for the installed plugin deployment

fn main() {
    std::process::exit(plugcli::cli::run());
}
