use xwmux::config::Config;
use xwmux::display::XDisplay;
use xwmux::reactor::Reactor;
use xwmux::tmux::ShellTmux;

fn main() {
    env_logger::init();

    let config = Config::load();
    log::info!("starting with config: {:#?}", config);

    let display = match XDisplay::open() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("xwmux: {}", e);
            std::process::exit(1);
        }
    };

    let tmux = ShellTmux::new(config.tmux.bin.clone());
    let mut reactor = Reactor::new(display, tmux, config);
    reactor.run();
}
