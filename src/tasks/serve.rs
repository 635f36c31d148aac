use crate::runner::Runner;
use crate::server;
use anyhow::{anyhow, bail, Result};

/// Start the live-reloading proxy and return once it is listening
pub fn serve(runner: &Runner) -> Result<()> {
    let ctx = runner.context();
    if ctx.live_reload().is_some() {
        bail!("The development server is already running");
    }

    let live_reload = server::start(ctx)?;
    ctx.set_live_reload(live_reload)
        .map_err(|_| anyhow!("The development server is already running"))
}

/// Tell connected browsers to reload
pub fn reload(runner: &Runner) -> Result<()> {
    let ctx = runner.context();
    match ctx.live_reload() {
        Some(live_reload) => {
            let reached = live_reload.publish(ctx.reporter);
            ctx.reporter.debug(&format!("Reload sent to {} browser(s)", reached));
        }
        None => ctx.reporter.debug("No development server running, nothing to reload"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{Context, Registry};
    use crate::ui::Verbosity;

    #[test]
    fn test_reload_without_server_is_noop() {
        let context = Context::new().with_verbosity(Verbosity::Silent);
        let runner = Runner::new(Registry::standard(), context);
        assert!(reload(&runner).is_ok());
    }

    #[test]
    fn test_serve_twice_fails() {
        let context = Context::new().with_verbosity(Verbosity::Silent);
        let runner = Runner::new(Registry::standard(), context);

        serve(&runner).unwrap();
        let live_reload = runner.context().live_reload().unwrap();
        assert_eq!(live_reload.client_count(), 0);
        assert!(live_reload.start_url().ends_with("/gulp-ready/"));

        let err = serve(&runner).unwrap_err();
        assert!(err.to_string().contains("already running"));
        assert!(reload(&runner).is_ok());
    }
}
