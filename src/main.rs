use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use optilab::address::{parse_slot, ResourceAddress};
use optilab::capture;
use optilab::chassis::ChassisInventory;
use optilab::config::{InstrumentKind, LabConfig, DEFAULT_CONFIG_FILE};
use optilab::instruments::counter::DEFAULT_INPUT;
use optilab::instruments::osnr::{COARSE_STEP, FINE_STEP};
use optilab::instruments::oscilloscope::DEFAULT_CDR_CHANNEL;
use optilab::instruments::{
    Attenuator, Bert, FrequencyCounter, OpticalSwitch, Osa, Oscilloscope, OsnrGenerator,
    PowerMeter, ReferenceTransmitter, ScopeMode, TunableLaser,
};
use optilab::readout::{AttenuatorReadout, LaserReadout, PowerMeterReadout, TransmitterReadout};
use optilab::units::{round_to, PowerUnit};
use optilab::Session;

/// Drive optical lab instruments over GPIB and TCP/IP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// VISA resource string, e.g. GPIB0::20::INSTR or TCPIP0::10.0.0.5::5025::SOCKET
    #[arg(short, long, global = true)]
    address: Option<String>,

    /// Instrument name from the configuration file
    #[arg(short, long, global = true, conflicts_with = "address")]
    instrument: Option<String>,

    /// -v for debug output, -vv for every SCPI exchange
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the *IDN? reply
    Idn,
    /// Print the *OPT? reply
    Options,
    /// Send *RST
    Reset,
    /// Send a raw SCPI command
    Raw {
        #[command(subcommand)]
        action: RawAction,
    },
    /// List the modules installed in a Lightwave mainframe
    Scan,
    Attenuator(AttenuatorArgs),
    PowerMeter(PowerMeterArgs),
    Laser(LaserArgs),
    Transmitter(TransmitterArgs),
    Osnr {
        #[command(subcommand)]
        action: OsnrAction,
    },
    Osa {
        #[command(subcommand)]
        action: OsaAction,
    },
    Scope {
        #[command(subcommand)]
        action: ScopeAction,
    },
    Switch {
        #[command(subcommand)]
        action: SwitchAction,
    },
    /// Measure frequency
    Counter {
        #[arg(long, default_value_t = DEFAULT_INPUT)]
        input: u32,
    },
    Bert {
        #[command(subcommand)]
        action: BertAction,
    },
}

#[derive(Subcommand, Debug)]
enum RawAction {
    Query { command: String },
    Write { command: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn is_on(self) -> bool {
        matches!(self, Toggle::On)
    }
}

#[derive(Args, Debug)]
struct AttenuatorArgs {
    /// EXFO chassis number
    #[arg(long, value_parser = parse_slot)]
    chassis: Option<u32>,
    #[arg(long, value_parser = parse_slot)]
    slot: Option<u32>,
    #[arg(long, default_value_t = 1)]
    channel: u32,
    #[command(subcommand)]
    action: AttenuatorAction,
}

#[derive(Subcommand, Debug)]
enum AttenuatorAction {
    Show,
    SetAttenuation {
        #[arg(allow_negative_numbers = true)]
        db: f64,
    },
    SetOffset {
        #[arg(allow_negative_numbers = true)]
        db: f64,
    },
    SetWavelength { nm: f64 },
    SetPower {
        #[arg(allow_negative_numbers = true)]
        dbm: f64,
    },
    Enable,
    Disable,
}

#[derive(Args, Debug)]
struct PowerMeterArgs {
    #[arg(long, value_parser = parse_slot)]
    slot: Option<u32>,
    #[command(subcommand)]
    action: PowerMeterAction,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum UnitArg {
    Dbm,
    Watt,
}

impl From<UnitArg> for PowerUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Dbm => PowerUnit::Dbm,
            UnitArg::Watt => PowerUnit::Watt,
        }
    }
}

#[derive(Subcommand, Debug)]
enum PowerMeterAction {
    Show,
    SetWavelength {
        #[arg(long, default_value_t = 1)]
        channel: u32,
        nm: f64,
    },
    SetUnit {
        #[arg(long, default_value_t = 1)]
        channel: u32,
        unit: UnitArg,
    },
}

#[derive(Args, Debug)]
struct LaserArgs {
    #[arg(long, value_parser = parse_slot)]
    slot: Option<u32>,
    #[arg(long, default_value_t = 1)]
    channel: u32,
    #[command(subcommand)]
    action: LaserAction,
}

#[derive(Subcommand, Debug)]
enum LaserAction {
    Show,
    On,
    Off,
    SetWavelength { nm: f64 },
}

#[derive(Args, Debug)]
struct TransmitterArgs {
    #[arg(long, value_parser = parse_slot)]
    slot: Option<u32>,
    #[arg(long, default_value_t = 1)]
    channel: u32,
    #[command(subcommand)]
    action: TransmitterAction,
}

#[derive(Subcommand, Debug)]
enum TransmitterAction {
    Show,
    On,
    Off,
    /// Start recalibration
    Recal,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Direction {
    Up,
    Down,
}

#[derive(Subcommand, Debug)]
enum OsnrAction {
    /// ASE source and EDFA on
    On,
    /// ASE source and EDFA off
    Off,
    /// Show or set the ITU channel
    Channel { channel: Option<u32> },
    SetOsnr { db: f64 },
    /// Step the OSNR setting by 1 dB, or 0.2 dB with --fine
    Step {
        direction: Direction,
        #[arg(long)]
        fine: bool,
    },
    /// Show or set the output power
    OutputPower {
        #[arg(allow_negative_numbers = true)]
        dbm: Option<f64>,
    },
    /// Show or set the input power reference
    InputRef {
        #[arg(allow_negative_numbers = true)]
        dbm: Option<f64>,
    },
    /// Lock the input power
    Lock,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SweepMode {
    Auto,
    Repeat,
    Single,
    Stop,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OsaParam {
    Center,
    Start,
    Stop,
    Span,
    Resolution,
    NoiseBandwidth,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SettingAction {
    Load,
    Save,
    Delete,
}

#[derive(Subcommand, Debug)]
enum OsaAction {
    Sweep { mode: SweepMode },
    /// Set a span parameter, in nm
    Set { param: OsaParam, value: f64 },
    /// Show the span parameters
    Show,
    /// WDM analysis of the current trace
    Wdm,
    /// Side-mode suppression analysis of the current trace
    Smsr,
    /// Save the current trace as CSV
    Capture {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Manage internal setting files
    Setting { action: SettingAction, name: String },
}

#[derive(Subcommand, Debug)]
enum ScopeAction {
    Autoscale,
    Run,
    Stop,
    Mode { mode: ScopeMode },
    /// Total and data-dependent jitter
    Jitter,
    /// Eye measurements
    Eye {
        /// Include PAM4 TDECQ and outer extinction ratio
        #[arg(long)]
        pam4: bool,
    },
    /// Wait until the acquisition count stops changing
    Wait,
    /// Lock clock recovery to a rate, or show its ratio
    Cdr {
        #[arg(long, default_value_t = DEFAULT_CDR_CHANNEL)]
        channel: u32,
        #[arg(long)]
        rate: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
enum SwitchAction {
    Connect { input: u32, output: u32 },
    Disconnect { input: u32, output: u32 },
    DisconnectAll,
    /// Show what a port is connected to
    Check { port: u32 },
}

#[derive(Subcommand, Debug)]
enum BertAction {
    /// Recall a saved workspace
    Recall { file: String },
    /// Load PRBS31 on generator and analyzer
    Prbs31,
    Outputs { state: Toggle },
    Impairments { state: Toggle },
    Ssc { state: Toggle },
    InsertError,
}

/// The instrument a command is aimed at.
impl Command {
    /// Instrument family the command drives; `None` for generic SCPI commands.
    fn family(&self) -> Option<InstrumentKind> {
        match self {
            Command::Idn | Command::Options | Command::Reset | Command::Raw { .. } => None,
            Command::Scan => Some(InstrumentKind::Chassis),
            Command::Attenuator(_) => Some(InstrumentKind::Attenuator),
            Command::PowerMeter(_) => Some(InstrumentKind::PowerMeter),
            Command::Laser(_) => Some(InstrumentKind::TunableLaser),
            Command::Transmitter(_) => Some(InstrumentKind::ReferenceTransmitter),
            Command::Osnr { .. } => Some(InstrumentKind::Osnr),
            Command::Osa { .. } => Some(InstrumentKind::Osa),
            Command::Scope { .. } => Some(InstrumentKind::Oscilloscope),
            Command::Switch { .. } => Some(InstrumentKind::Switch),
            Command::Counter { .. } => Some(InstrumentKind::Counter),
            Command::Bert { .. } => Some(InstrumentKind::Bert),
        }
    }
}

struct Target {
    address: String,
    nickname: String,
    chassis: Option<u32>,
    slot: Option<u32>,
}

impl Target {
    fn resolve(cli: &Cli, config: &LabConfig) -> Result<Self> {
        if let Some(address) = &cli.address {
            address.parse::<ResourceAddress>().with_context(|| {
                "expected GPIB<board>::<address>::INSTR or TCPIP<board>::<host>::<port>::SOCKET"
            })?;
            return Ok(Self {
                address: address.clone(),
                nickname: address.clone(),
                chassis: None,
                slot: None,
            });
        }
        let name = cli
            .instrument
            .as_deref()
            .context("no instrument given; use --address or --instrument")?;
        let entry = config.instrument_for(name, cli.command.family())?;
        Ok(Self {
            address: entry.address.clone(),
            nickname: entry.nickname.clone().unwrap_or_else(|| name.to_string()),
            chassis: entry.chassis,
            slot: entry.slot,
        })
    }

    fn session(&self, config: &LabConfig) -> Result<Session> {
        Session::connect(&self.address, &self.nickname, config.timing.clone())
            .with_context(|| format!("failed to connect to {}", self.address))
    }

    fn slot(&self, slot: Option<u32>) -> Result<u32> {
        slot.or(self.slot)
            .context("--slot is required (or set `slot` in the configuration)")
    }
}

fn init_logging(config_level: &str, verbose: u8) {
    let level = match verbose {
        0 => config_level,
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LabConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    init_logging(&config.log_level, cli.verbose);
    debug!(config = %cli.config.display(), "configuration loaded");

    let target = Target::resolve(&cli, &config)?;
    let session = target.session(&config)?;
    run(&cli.command, &target, session)
}

fn run(command: &Command, target: &Target, mut session: Session) -> Result<()> {
    match command {
        Command::Idn => println!("{}", session.idn()?),
        Command::Options => println!("{}", session.slot_idns()?),
        Command::Reset => session.reset()?,
        Command::Raw { action } => match action {
            RawAction::Query { command } => println!("{}", session.query(command)?),
            RawAction::Write { command } => session.write(command)?,
        },
        Command::Scan => print!("{}", ChassisInventory::discover(&mut session)?),
        Command::Attenuator(args) => attenuator(args, target, session)?,
        Command::PowerMeter(args) => power_meter(args, target, session)?,
        Command::Laser(args) => laser(args, target, session)?,
        Command::Transmitter(args) => transmitter(args, target, session)?,
        Command::Osnr { action } => osnr(action, session)?,
        Command::Osa { action } => osa(action, session)?,
        Command::Scope { action } => scope(action, session)?,
        Command::Switch { action } => switch(action, session)?,
        Command::Counter { input } => {
            let mut counter = FrequencyCounter::new(session)?;
            println!("{} Hz", counter.frequency(*input)?);
        }
        Command::Bert { action } => bert(action, session)?,
    }
    Ok(())
}

fn attenuator(args: &AttenuatorArgs, target: &Target, session: Session) -> Result<()> {
    let chassis = args.chassis.or(target.chassis).unwrap_or(1);
    let slot = target.slot(args.slot)?;
    let mut att = Attenuator::new(session)?;
    match args.action {
        AttenuatorAction::Show => {
            print!("{}", AttenuatorReadout::read(&mut att, chassis, slot));
            return Ok(());
        }
        AttenuatorAction::SetAttenuation { db } => att.set_attenuation(chassis, slot, db)?,
        AttenuatorAction::SetOffset { db } => att.set_offset(chassis, slot, db)?,
        AttenuatorAction::SetWavelength { nm } => att.set_wavelength(chassis, slot, nm)?,
        AttenuatorAction::SetPower { dbm } => att.set_power_setpoint(chassis, slot, dbm)?,
        AttenuatorAction::Enable => att.enable(slot, args.channel)?,
        AttenuatorAction::Disable => att.disable(slot, args.channel)?,
    }
    print!("{}", AttenuatorReadout::read(&mut att, chassis, slot));
    Ok(())
}

fn power_meter(args: &PowerMeterArgs, target: &Target, session: Session) -> Result<()> {
    let slot = target.slot(args.slot)?;
    let mut meter = PowerMeter::new(session);
    match args.action {
        PowerMeterAction::Show => {}
        PowerMeterAction::SetWavelength { channel, nm } => {
            meter.set_wavelength(slot, channel, nm)?
        }
        PowerMeterAction::SetUnit { channel, unit } => {
            meter.set_unit(slot, channel, unit.into())?
        }
    }
    print!("{}", PowerMeterReadout::read(&mut meter, slot));
    Ok(())
}

fn laser(args: &LaserArgs, target: &Target, session: Session) -> Result<()> {
    let slot = target.slot(args.slot)?;
    let mut tls = TunableLaser::new(session);
    match args.action {
        LaserAction::Show => {}
        LaserAction::On => tls.enable(slot, args.channel)?,
        LaserAction::Off => tls.disable(slot, args.channel)?,
        LaserAction::SetWavelength { nm } => tls.set_wavelength(slot, args.channel, nm)?,
    }
    print!("{}", LaserReadout::read(&mut tls, slot, args.channel));
    Ok(())
}

fn transmitter(args: &TransmitterArgs, target: &Target, session: Session) -> Result<()> {
    let slot = target.slot(args.slot)?;
    let mut tx = ReferenceTransmitter::new(session);
    match args.action {
        TransmitterAction::Show => {}
        TransmitterAction::On => tx.enable(slot, args.channel)?,
        TransmitterAction::Off => tx.disable(slot, args.channel)?,
        TransmitterAction::Recal => tx.recalibrate(slot)?,
    }
    print!("{}", TransmitterReadout::read(&mut tx, slot, args.channel));
    Ok(())
}

fn osnr(action: &OsnrAction, session: Session) -> Result<()> {
    let mut generator = OsnrGenerator::new(session);
    match *action {
        OsnrAction::On => generator.enable()?,
        OsnrAction::Off => generator.disable()?,
        OsnrAction::Channel { channel } => {
            if let Some(channel) = channel {
                generator.set_itu_channel(channel)?;
            }
            println!("ITU channel: {}", generator.itu_channel()?);
        }
        OsnrAction::SetOsnr { db } => generator.set_osnr(db)?,
        OsnrAction::Step { direction, fine } => {
            let step = if fine { FINE_STEP } else { COARSE_STEP };
            let delta = match direction {
                Direction::Up => step,
                Direction::Down => -step,
            };
            let osnr = generator
                .step_osnr(delta)
                .context("the generator's OSNR readback is unreliable; set it directly with set-osnr")?;
            println!("OSNR set to {} dB", round_to(osnr, 1));
        }
        OsnrAction::OutputPower { dbm } => {
            if let Some(dbm) = dbm {
                generator.set_output_power(dbm)?;
            }
            println!("Output power: {}", generator.output_power()?);
        }
        OsnrAction::InputRef { dbm } => {
            if let Some(dbm) = dbm {
                generator.set_input_power_ref(dbm)?;
            }
            println!("Input power reference: {}", generator.input_power_ref()?);
        }
        OsnrAction::Lock => generator.lock_input_power()?,
    }
    Ok(())
}

fn osa(action: &OsaAction, session: Session) -> Result<()> {
    let mut osa = Osa::new(session);
    if let OsaAction::Setting { action, name } = action {
        match action {
            SettingAction::Load => osa.load_setting(name)?,
            SettingAction::Save => osa.save_setting(name)?,
            SettingAction::Delete => osa.delete_setting(name)?,
        }
        return Ok(());
    }

    osa.ensure_legacy_mode()?;
    match action {
        OsaAction::Sweep { mode } => match mode {
            SweepMode::Auto => osa.auto_sweep()?,
            SweepMode::Repeat => osa.repeat_sweep()?,
            SweepMode::Single => osa.single_sweep()?,
            SweepMode::Stop => osa.stop_sweep()?,
        },
        OsaAction::Set { param, value } => match param {
            OsaParam::Center => osa.set_center(*value)?,
            OsaParam::Start => osa.set_start(*value)?,
            OsaParam::Stop => osa.set_stop(*value)?,
            OsaParam::Span => osa.set_span(*value)?,
            OsaParam::Resolution => osa.set_resolution(*value)?,
            OsaParam::NoiseBandwidth => osa.set_noise_bandwidth(*value)?,
        },
        OsaAction::Show => {
            println!("Center:          {} nm", osa.center()?);
            println!("Start:           {} nm", osa.start()?);
            println!("Stop:            {} nm", osa.stop()?);
            println!("Span:            {} nm", osa.span()?);
            println!("Resolution:      {} nm", osa.resolution()?);
            println!("Noise bandwidth: {} nm", osa.noise_bandwidth()?);
        }
        OsaAction::Wdm => {
            let wdm = osa.wdm_analysis()?;
            println!("Peak wavelength: {} nm", wdm.peak_wavelength);
            println!("Peak level:      {} dBm", wdm.peak_level);
            println!("OSNR:            {} dB", wdm.snr);
        }
        OsaAction::Smsr => {
            let smsr = osa.smsr_analysis()?;
            println!("Peak:      {} nm, {} dBm", smsr.peak_wavelength, smsr.peak_level);
            println!(
                "Side mode: {} nm, {} dBm",
                smsr.side_mode_wavelength, smsr.side_mode_level
            );
            println!(
                "SMSR:      {} nm apart, {} dB",
                smsr.wavelength_difference, smsr.level_difference
            );
        }
        OsaAction::Capture { dir } => {
            let path = capture::capture_trace(&mut osa, dir)?;
            println!("{}", path.display());
        }
        OsaAction::Setting { .. } => {}
    }
    Ok(())
}

fn scope(action: &ScopeAction, session: Session) -> Result<()> {
    let mut dca = Oscilloscope::new(session);
    match *action {
        ScopeAction::Autoscale => dca.autoscale()?,
        ScopeAction::Run => dca.run()?,
        ScopeAction::Stop => dca.stop()?,
        ScopeAction::Mode { mode } => dca.set_mode(mode)?,
        ScopeAction::Jitter => {
            let jitter = dca.measure_jitter()?;
            println!("TJ:  {} UI", jitter.total);
            println!("DDJ: {} UI", jitter.data_dependent);
        }
        ScopeAction::Eye { pam4 } => {
            println!("Mask margin:      {}", dca.mask_margin()?);
            println!("Extinction ratio: {} dB", dca.extinction_ratio()?);
            println!("Crossing:         {} %", dca.crossing()?);
            println!("TDEC:             {} dB", dca.tdec()?);
            if pam4 {
                println!("TDECQ:            {} dB", dca.tdecq()?);
                println!("OER:              {} dB", dca.oer()?);
            }
        }
        ScopeAction::Wait => {
            let count = dca.wait_for_acquisition()?;
            println!("Acquisition settled at {count}");
        }
        ScopeAction::Cdr { channel, rate } => {
            if let Some(rate) = rate {
                dca.cdr_lock(channel, rate)?;
            }
            println!("CDR {channel} ratio: {}", dca.cdr_ratio(channel)?);
        }
    }
    Ok(())
}

fn switch(action: &SwitchAction, session: Session) -> Result<()> {
    let mut sw = OpticalSwitch::new(session);
    match *action {
        SwitchAction::Connect { input, output } => sw.connect_ports(input, output)?,
        SwitchAction::Disconnect { input, output } => sw.disconnect_ports(input, output)?,
        SwitchAction::DisconnectAll => sw.disconnect_all()?,
        SwitchAction::Check { port } => println!("Port {port}: {}", sw.connection(port)?),
    }
    Ok(())
}

fn bert(action: &BertAction, session: Session) -> Result<()> {
    let mut bert = Bert::new(session);
    match action {
        BertAction::Recall { file } => bert.recall_state(file)?,
        BertAction::Prbs31 => bert.configure_prbs31()?,
        BertAction::Outputs { state } => bert.set_global_outputs(state.is_on())?,
        BertAction::Impairments { state } => bert.set_impairments(state.is_on())?,
        BertAction::Ssc { state } => bert.set_ssc(state.is_on())?,
        BertAction::InsertError => bert.insert_error()?,
    }
    Ok(())
}
