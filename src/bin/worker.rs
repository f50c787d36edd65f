use radar_sim::worker_agent::RadarTask;
use yew_agent::Registrable;

fn main() {
    // Set the panic hook to log detailed errors to the console
    console_error_panic_hook::set_once();
    #[cfg(target_arch = "wasm32")]
    radar_sim::utils::init_logging();
    RadarTask::registrar().register();
}
