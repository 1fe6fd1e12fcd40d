use vergen_gitcl::{Emitter, GitclBuilder};

// exposes VERGEN_GIT_SHA and VERGEN_GIT_DIRTY to the startup log
fn main() -> anyhow::Result<()> {
    let git = GitclBuilder::default().sha(true).dirty(true).build()?;
    Emitter::default().add_instructions(&git)?.emit()?;

    Ok(())
}
