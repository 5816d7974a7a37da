use color_eyre::config::HookBuilder;
use eyre::Result;

/// Installs the eyre report handler and a panic hook that logs the panic
/// before printing it: a backtrace in debug builds, a crash report otherwise.
pub fn init_errors() -> Result<()> {
    let (panic_hook, eyre_hook) = HookBuilder::default()
        .display_location_section(cfg!(debug_assertions))
        .into_hooks();
    eyre_hook.install()?;

    std::panic::set_hook(Box::new(move |panic_info| {
        error!("{}", panic_hook.panic_report(panic_info));

        #[cfg(not(debug_assertions))]
        {
            use human_panic::{
                handle_dump,
                metadata,
                print_msg,
            };
            let metadata = metadata!();
            let file_path = handle_dump(&metadata, panic_info);
            print_msg(file_path, &metadata).ok();
        }

        #[cfg(debug_assertions)]
        better_panic::Settings::auto()
            .most_recent_first(false)
            .lineno_suffix(true)
            .verbosity(better_panic::Verbosity::Full)
            .create_panic_handler()(panic_info);

        std::process::exit(1);
    }));

    Ok(())
}
