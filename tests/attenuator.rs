use optilab::config::Timing;
use optilab::instruments::{Attenuator, AttenuatorKind, OutputState};
use optilab::transport::{Exchange, MockTransport};
use optilab::{Error, Session};

fn attenuator(mock: &MockTransport, idn: &str) -> Attenuator {
    mock.respond("*IDN?", idn);
    let session = Session::with_transport(
        "GPIB0::2::INSTR",
        "Attenuator",
        Box::new(mock.clone()),
        Timing::immediate(),
    );
    let att = Attenuator::new(session).unwrap();
    mock.reset_log();
    att
}

#[test]
fn exfo_chassis_uses_lins_prefix() {
    let mock = MockTransport::new();
    let mut att = attenuator(&mock, "EXFO LTB-8,123,1.0");
    assert_eq!(att.kind(), AttenuatorKind::ExfoChassis);

    mock.respond("LINS0013:INP:RATT?", "+5.000");
    assert_eq!(att.attenuation(1, 3).unwrap(), 5.0);

    att.set_attenuation(1, 3, 7.5).unwrap();
    att.set_offset(1, 3, 0.25).unwrap();
    att.set_wavelength(1, 3, 1550.0).unwrap();
    att.set_power_setpoint(1, 3, -4.0).unwrap();
    assert_eq!(
        mock.writes(),
        vec![
            "LINS0013:INP:RATT 7.5",
            "LINS0013:INP:OFFs 0.25 DB",
            "LINS0013:INP:WAV 1550 NM",
            "LINS0013:INP:ATT 4",
        ]
    );

    mock.respond("LINS0013:INP:ATT?", "4.0");
    assert_eq!(att.power_setpoint(1, 3).unwrap(), -4.0);
}

#[test]
fn exfo_module_flips_sign_and_applies_offset() {
    let mock = MockTransport::new();
    let mut att = attenuator(&mock, "EXFO FVA-3150,4321,2.0");
    assert_eq!(att.kind(), AttenuatorKind::ExfoModule);

    mock.respond("INP:ATT?", "-12.5");
    assert_eq!(att.attenuation(0, 0).unwrap(), 12.5);

    mock.respond("INP:OFFS?", "1.5");
    // -((-(-12.5)) - 1.5) = -11
    assert_eq!(att.power_setpoint(0, 0).unwrap(), -11.0);

    mock.reset_log();
    att.set_power_setpoint(0, 0, -10.0).unwrap();
    // attenuation = 10 + 1.5, sent negated
    assert_eq!(mock.writes(), vec!["INP:ATT -11.5"]);

    mock.reset_log();
    att.set_attenuation(0, 0, 3.0).unwrap();
    att.set_wavelength(0, 0, 1310.0).unwrap();
    assert_eq!(mock.writes(), vec!["INP:ATT -3", "INP:WAVE 1310"]);
}

#[test]
fn exfo_module_wavelength_is_converted_to_meters() {
    let mock = MockTransport::new();
    let mut att = attenuator(&mock, "EXFO FVA-3150,4321,2.0");
    mock.respond("INP:WAVE?", "1550.000");
    let meters = att.wavelength(0, 0).unwrap();
    assert!((meters - 1.55e-6).abs() < 1e-15);
    assert_eq!(mock.queries(), vec!["INP:WAVE?"]);
}

#[test]
fn stale_wavelength_is_requeried_at_most_twice() {
    let mock = MockTransport::new();
    let mut att = attenuator(&mock, "Agilent Technologies,8164B,DE1,V5");
    mock.respond(":INP2:WAV?", "+9.9E+37");
    let reading = att.wavelength(1, 2).unwrap();
    assert_eq!(reading, 9.9e37);
    assert_eq!(mock.count(&Exchange::Query(":INP2:WAV?".into())), 3);

    let mock = MockTransport::new();
    let mut att = attenuator(&mock, "Agilent Technologies,8164B,DE1,V5");
    mock.respond(":INP2:WAV?", "+9.9E+37")
        .respond(":INP2:WAV?", "+1.55000000E-006");
    assert!((att.wavelength(1, 2).unwrap() - 1.55e-6).abs() < 1e-15);
    assert_eq!(mock.count(&Exchange::Query(":INP2:WAV?".into())), 2);
}

#[test]
fn keysight_commands_ignore_chassis() {
    let mock = MockTransport::new();
    let mut att = attenuator(&mock, "Agilent Technologies,8164B,DE1,V5");
    assert_eq!(att.kind(), AttenuatorKind::Keysight);

    att.set_attenuation(9, 2, 10.0).unwrap();
    att.set_wavelength(9, 2, 1550.5).unwrap();
    att.set_power_setpoint(9, 2, -3.0).unwrap();
    att.enable(2, 1).unwrap();
    assert_eq!(
        mock.writes(),
        vec![
            "INP2:ATT 10",
            ":INP2:WAV 1550.5nm",
            "OUTP2:POW -3",
            "OUTP2:CHAN1:STAT 1",
        ]
    );

    mock.respond("OUTP2:CHAN1:STAT?", "1");
    assert_eq!(att.state(2, 1).unwrap(), OutputState::On);
}

#[test]
fn setters_refresh_before_writing() {
    let mock = MockTransport::new();
    let mut att = attenuator(&mock, "Agilent Technologies,8164B,DE1,V5");
    att.set_wavelength(1, 2, 1550.0).unwrap();
    assert_eq!(
        mock.log(),
        vec![
            Exchange::Query("*IDN?".into()),
            Exchange::Write(":INP2:WAV 1550nm".into()),
        ]
    );
}

#[test]
fn exfo_has_no_output_switch() {
    let mock = MockTransport::new();
    let mut att = attenuator(&mock, "EXFO LTB-8,123,1.0");
    assert!(matches!(att.enable(1, 1), Err(Error::Unsupported { .. })));
    assert!(matches!(att.state(1, 1), Err(Error::Unsupported { .. })));
    assert!(mock.log().is_empty());
}
