use std::error::Error;
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn Error>> {
    // Outside a git checkout the describe string is unavailable, fall back to "unknown"
    if EmitBuilder::builder()
        .fail_on_error()
        .all_git()
        .git_describe(true, false, None)
        .emit()
        .is_err()
    {
        println!("cargo:rustc-env=VERGEN_GIT_DESCRIBE=unknown");
    }
    Ok(())
}
