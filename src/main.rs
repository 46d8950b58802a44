use std::{future, io, process::ExitCode};

use anyhow::Result;
use gpu_keepalive::{
    arg_parser::ArgsOptions,
    errors::FAILURE_STATUS,
    frame_pacer::{FrameClock, FramePacer, ThreadClock},
    gpu_context::{GpuContext, egl_backend::EglBackend},
    logger,
    renderer::gles_renderer::GlesRenderer,
};
use tokio::{select, signal::ctrl_c, task};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

// The runtime worker threads only watch for termination signals.
// All GPU work happens on the main thread, where the context is current
#[tokio::main]
async fn main() -> ExitCode {
    logger::init_logging();

    // Parse the command line arguments before touching the GPU
    let args_options = match ArgsOptions::parse() {
        Ok(options) => options,
        Err(err) => {
            ArgsOptions::report_error(&err, &mut io::stderr())
                .unwrap_or_else(|e| error!("Failed to report error: {e}"));

            return ExitCode::from(err.exit_status());
        }
    };

    if let Err(err) = run(args_options) {
        // One line naming the step that failed
        error!("{err:#}");

        return ExitCode::from(FAILURE_STATUS);
    }

    ExitCode::SUCCESS
}

fn run(options: ArgsOptions) -> Result<()> {
    let backend = EglBackend::load()?;
    let gpu = GpuContext::create(backend)?;

    let renderer = GlesRenderer::new(&gpu);

    // This token is used to stop the pacer on termination signals
    let token = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(token.clone()));

    let mut clock = ThreadClock;

    let mut pacer = FramePacer::new(renderer, options.fps);
    if options.verbose {
        pacer = pacer.with_fps_report(clock.now());
    }

    // The draw-sleep loop blocks the main thread with microsecond sleeps
    let frames = task::block_in_place(|| {
        pacer.run(&token, &mut clock, &mut io::stdout())
    })?;
    info!("Drew {frames} frames");

    // The pacer and its renderer are dropped before the GPU context
    Ok(())
}

// Cancel the token on ctrl-c or, on Unix, SIGTERM
async fn wait_for_shutdown(token: CancellationToken) {
    let interrupt = async {
        if let Err(err) = ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {err}");
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    select! {
        _ = interrupt => {},
        _ = terminate => {},
    }

    info!("Shutdown requested");
    token.cancel();
}
