use std::process::Command;
use vergen::EmitBuilder;

fn main() {
    // Container builds usually copy the sources without the .git directory
    let inside_git_checkout = Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);

    let mut builder = EmitBuilder::builder();
    builder.build_timestamp();
    if inside_git_checkout {
        builder.git_sha(true);
    }

    if let Err(e) = builder.emit() {
        println!("cargo:warning=build metadata unavailable: {e}");
    }
}
