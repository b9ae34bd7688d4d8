//! Integration tests for parameter status resolution.

use approx::assert_relative_eq;
use specfit_rs::calibration::{Calibration, LinearCalibration};
use specfit_rs::status::{
    AllocationRequest, DeclaredShape, FitSession, ParameterStatus, ParameterStatusModel,
    StatusKind, StatusSpec, TheuerkaufShape,
};
use specfit_rs::SpecFitError;

/// A Gaussian whose width may be free, shared or held.
fn gauss() -> ParameterStatusModel {
    let shape = DeclaredShape::new("gauss")
        .parameter(
            "pos",
            [StatusKind::Free, StatusKind::FixedAtDefault, StatusKind::FixedAtValue],
            ParameterStatus::Free,
        )
        .parameter(
            "fwhm",
            [
                StatusKind::Free,
                StatusKind::Shared,
                StatusKind::FixedAtDefault,
                StatusKind::FixedAtValue,
            ],
            ParameterStatus::Shared,
        );
    ParameterStatusModel::new(shape)
}

#[test]
fn test_unambiguous_prefixes() {
    let model = gauss();
    assert_eq!(model.parse_status("fwhm", "f").unwrap(), ParameterStatus::Free);
    assert_eq!(model.parse_status("fwhm", "fr").unwrap(), ParameterStatus::Free);
    assert_eq!(model.parse_status("fwhm", "free").unwrap(), ParameterStatus::Free);
    assert_eq!(model.parse_status("fwhm", "EQ").unwrap(), ParameterStatus::Shared);
    assert_eq!(
        model.parse_status("fwhm", "2.5").unwrap(),
        ParameterStatus::FixedAtValue(2.5)
    );
}

#[test]
fn test_statuses_are_validated_on_assignment() {
    let mut model = gauss();
    assert!(matches!(
        model.set_status("pos", "equal"),
        Err(SpecFitError::InvalidStatus { .. })
    ));
    assert!(matches!(
        model.set_status("area", "free"),
        Err(SpecFitError::UnknownParameter(_))
    ));
    assert!(matches!(model.set_status("fwhm", "1.2.3"), Err(SpecFitError::Parse(_))));

    // A failed assignment keeps the previous status.
    assert_eq!(
        model.status("fwhm").unwrap(),
        &StatusSpec::Uniform(ParameterStatus::Shared)
    );
}

#[test]
fn test_per_peak_list_resolution() {
    let mut model = gauss();
    model.set_status("pos", "free, hold, 3.5").unwrap();
    model.check_status_len(3).unwrap();

    assert_eq!(model.status_for_peak("pos", 0).unwrap(), ParameterStatus::Free);
    assert_eq!(
        model.status_for_peak("pos", 1).unwrap(),
        ParameterStatus::FixedAtDefault
    );
    assert_eq!(
        model.status_for_peak("pos", 2).unwrap(),
        ParameterStatus::FixedAtValue(3.5)
    );

    let cal = LinearCalibration::new(1.0, 2.0).unwrap();
    let mut session = FitSession::new();
    let request = model
        .resolve(&mut session, "pos", 2, 10.0, &cal, None)
        .unwrap();
    assert_eq!(request, AllocationRequest::Fixed(Some(cal.to_uncalibrated(3.5))));
    assert_eq!(request, AllocationRequest::Fixed(Some(1.25)));

    assert!(matches!(
        model.resolve(&mut session, "pos", 3, 10.0, &cal, None),
        Err(SpecFitError::MissingPeakStatus {
            needed: 4,
            given: 3,
            ..
        })
    ));
    assert!(model.check_status_len(4).is_err());
}

#[test]
fn test_shared_parameter_uses_one_slot_per_session() {
    let model = gauss();
    let cal = LinearCalibration::identity();
    let mut session = FitSession::new();

    let first = model
        .resolve(&mut session, "fwhm", 0, 100.0, &cal, Some(3.0))
        .unwrap();
    let second = model
        .resolve(&mut session, "fwhm", 1, 200.0, &cal, Some(4.0))
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(session.slot_count(), 1);

    session.reset_global_parameters();
    let third = model
        .resolve(&mut session, "fwhm", 2, 300.0, &cal, None)
        .unwrap();
    assert_ne!(third, first);
    assert!(session.slot(first.slot().unwrap()).is_none());
    assert!(session.slot(third.slot().unwrap()).is_some());
}

#[test]
fn test_shared_slots_do_not_cross_shapes() {
    let lorentz = ParameterStatusModel::new(DeclaredShape::new("lorentz").parameter(
        "fwhm",
        [StatusKind::Free, StatusKind::Shared],
        ParameterStatus::Shared,
    ));
    let first_gauss = gauss();
    let second_gauss = gauss();
    let cal = LinearCalibration::identity();
    let mut session = FitSession::new();

    let g0 = first_gauss
        .resolve(&mut session, "fwhm", 0, 100.0, &cal, None)
        .unwrap();
    let l0 = lorentz
        .resolve(&mut session, "fwhm", 0, 150.0, &cal, None)
        .unwrap();
    let g1 = second_gauss
        .resolve(&mut session, "fwhm", 1, 200.0, &cal, None)
        .unwrap();

    assert_ne!(g0, l0);
    assert_eq!(g0, g1);
    assert_eq!(session.slot_count(), 2);
    assert_eq!(session.global("lorentz", "fwhm"), l0.slot());
    assert_eq!(session.global("gauss", "fwhm"), g0.slot());
}

#[test]
fn test_free_parameters_get_distinct_slots() {
    let model = gauss();
    let cal = LinearCalibration::identity();
    let mut session = FitSession::new();

    let a = model.resolve(&mut session, "pos", 0, 100.0, &cal, Some(100.0)).unwrap();
    let b = model.resolve(&mut session, "pos", 1, 200.0, &cal, Some(200.0)).unwrap();
    assert_ne!(a, b);

    let slot = session.slot(b.slot().unwrap()).unwrap();
    assert_eq!(slot.initial, Some(200.0));
}

#[test]
fn test_theuerkauf_width_literal_in_channels() {
    let mut model = ParameterStatusModel::new(TheuerkaufShape::new());
    model.set_status("width", "2.0").unwrap();
    model.set_status("tl", "none").unwrap();

    // 0.5 keV per channel: 2 keV are 4 channels.
    let cal = LinearCalibration::new(10.0, 0.5).unwrap();
    let mut session = FitSession::new();
    match model.resolve(&mut session, "width", 0, 200.0, &cal, None).unwrap() {
        AllocationRequest::Fixed(Some(width)) => assert_relative_eq!(width, 4.0, epsilon = 1e-12),
        other => panic!("unexpected request {:?}", other),
    }
    assert_eq!(
        model.resolve(&mut session, "tl", 0, 200.0, &cal, None).unwrap(),
        AllocationRequest::Disabled
    );
    assert_eq!(session.slot_count(), 0);
}

#[test]
fn test_describe_lists_every_parameter() {
    let mut model = gauss();
    model.set_status("pos", "free, 3.5").unwrap();
    let text = model.describe();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("pos: "));
    assert!(lines[1].starts_with("fwhm: "));
}
