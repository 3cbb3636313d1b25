use approx::assert_abs_diff_eq;
use cardiorisk::coefficients::CoefficientRepository;
use cardiorisk::engine::RiskError;
use cardiorisk::inputs::levels::LevelMapError;
use cardiorisk::inputs::validate::ViolatedBound;
use cardiorisk::inputs::{LevelMap, LevelMaps, RawColumn, RiskInputs, ValidationError};
use cardiorisk::types::{EquationDescriptor, EquationVersion, Horizon, PredType, PreventType};
use cardiorisk::{EngineOptions, RiskRequest, predict_risk};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy)]
struct Subject {
    age: f64,
    female: bool,
    black: bool,
    smoker: bool,
    total_chol: Option<f64>,
    hdl: f64,
    sbp: f64,
    bp_meds: bool,
    statin: bool,
    diabetes: bool,
    bmi: f64,
    egfr: f64,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Scenario A: black woman, 55, TC 213, HDL 50, untreated SBP 120, non-smoker, no diabetes.
fn scenario_a() -> Subject {
    Subject {
        age: 55.0,
        female: true,
        black: true,
        smoker: false,
        total_chol: Some(213.0),
        hdl: 50.0,
        sbp: 120.0,
        bp_meds: false,
        statin: false,
        diabetes: false,
        bmi: 25.0,
        egfr: 90.0,
    }
}

fn scenario_b() -> Subject {
    Subject {
        female: false,
        ..scenario_a()
    }
}

/// Scenario D: woman, 50, TC 200, HDL 45, treated SBP 160, diabetic, BMI 35, eGFR 90.
fn scenario_d() -> Subject {
    Subject {
        age: 50.0,
        female: true,
        black: false,
        smoker: false,
        total_chol: Some(200.0),
        hdl: 45.0,
        sbp: 160.0,
        bp_meds: true,
        statin: false,
        diabetes: true,
        bmi: 35.0,
        egfr: 90.0,
    }
}

fn to_inputs(subjects: &[Subject]) -> RiskInputs {
    let numeric = |f: fn(&Subject) -> Option<f64>| RawColumn::Float(subjects.iter().map(f).collect());
    let labels = |f: fn(&Subject) -> &'static str| {
        RawColumn::Text(subjects.iter().map(|s| Some(f(s).to_string())).collect())
    };
    RiskInputs {
        age_years: numeric(|s| Some(s.age)),
        sex: labels(|s| if s.female { "female" } else { "male" }),
        smoke_current: labels(|s| yes_no(s.smoker)),
        chol_total_mgdl: numeric(|s| s.total_chol),
        chol_hdl_mgdl: numeric(|s| Some(s.hdl)),
        bp_sys_mmhg: numeric(|s| Some(s.sbp)),
        bp_meds: labels(|s| yes_no(s.bp_meds)),
        diabetes: labels(|s| yes_no(s.diabetes)),
        race: Some(labels(|s| if s.black { "black" } else { "white" })),
        statin_meds: Some(labels(|s| yes_no(s.statin))),
        bmi: Some(numeric(|s| Some(s.bmi))),
        egfr_mlminm2: Some(numeric(|s| Some(s.egfr))),
        acr: None,
        hba1c: None,
        sdi: None,
    }
}

fn request(version: EquationVersion, pred_type: PredType, horizon: Horizon) -> RiskRequest {
    RiskRequest::new(EquationDescriptor::new(pred_type, version, horizon))
}

fn goff() -> RiskRequest {
    request(EquationVersion::Goff2013, PredType::Ascvd, Horizon::TenYear)
}

fn risks(subjects: &[Subject], request: &RiskRequest) -> Vec<f64> {
    let repository = CoefficientRepository::shared().unwrap();
    predict_risk(&to_inputs(subjects), request, repository)
        .unwrap()
        .risk
        .to_vec()
}

#[test]
fn pooled_cohort_reference_scenarios() {
    let goff_risk = risks(&[scenario_a(), scenario_b()], &goff());
    assert_abs_diff_eq!(goff_risk[0], 0.0300, epsilon = 1e-3);
    assert_abs_diff_eq!(goff_risk[1], 0.0606, epsilon = 1e-3);

    let yadlowsky = request(
        EquationVersion::Yadlowsky2018,
        PredType::Ascvd,
        Horizon::TenYear,
    );
    let revised = risks(&[scenario_a()], &yadlowsky);
    assert_abs_diff_eq!(revised[0], 0.0180, epsilon = 5e-4);
}

#[test]
fn prevent_base_reference_scenarios() {
    let male = Subject {
        female: false,
        ..scenario_d()
    };
    let prevent = request(EquationVersion::Khan2023, PredType::Ascvd, Horizon::TenYear);
    let risk = risks(&[scenario_d(), male], &prevent);
    assert_abs_diff_eq!(risk[0], 0.0920, epsilon = 5e-4);
    assert_abs_diff_eq!(risk[1], 0.1019, epsilon = 5e-4);
}

#[test]
fn every_bundled_prevent_endpoint_evaluates() {
    for pred_type in [PredType::Ascvd, PredType::Cvd, PredType::Hf] {
        for horizon in [Horizon::TenYear, Horizon::ThirtyYear] {
            let prevent = request(EquationVersion::Khan2023, pred_type, horizon);
            let risk = risks(&[scenario_d()], &prevent);
            assert!(
                risk[0] > 0.0 && risk[0] < 1.0,
                "{pred_type} {horizon} gave {}",
                risk[0]
            );
        }
    }
}

#[test]
fn out_of_range_age_is_rejected_unless_overridden() {
    let young = Subject {
        age: 35.0,
        ..scenario_a()
    };
    let repository = CoefficientRepository::shared().unwrap();
    let err = predict_risk(&to_inputs(&[young]), &goff(), repository).unwrap_err();
    match err {
        RiskError::Validation(ValidationError::BoundsViolation {
            variable,
            observed_min,
            violated,
            ..
        }) => {
            assert_eq!(variable, "age_years");
            assert_eq!(observed_min, 35.0);
            assert_eq!(violated, ViolatedBound::Lower(40.0));
        }
        other => panic!("Expected BoundsViolation, got {other:?}"),
    }

    let overridden = goff().with_options(EngineOptions {
        override_boundary_errors: true,
        ..EngineOptions::default()
    });
    let risk = risks(&[young], &overridden);
    assert!(risk[0].is_finite());
}

#[test]
fn missing_required_value_yields_nan_row_and_one_report() {
    let gap = Subject {
        total_chol: None,
        ..scenario_a()
    };
    let batch = [scenario_a(), scenario_b(), gap, scenario_b()];
    let repository = CoefficientRepository::shared().unwrap();
    let prediction = predict_risk(&to_inputs(&batch), &goff(), repository).unwrap();

    let report = prediction.missing.expect("missing-data report");
    assert_eq!(report.missing_rows, 1);
    assert_eq!(report.missing_by_variable.len(), 1);
    assert_eq!(report.missing_by_variable["chol_total_mgdl"], 1);

    let single_a = risks(&[scenario_a()], &goff())[0];
    let single_b = risks(&[scenario_b()], &goff())[0];
    assert_eq!(prediction.risk[0], single_a);
    assert_eq!(prediction.risk[1], single_b);
    assert!(prediction.risk[2].is_nan());
    assert_eq!(prediction.risk[3], single_b);
}

#[test]
fn identical_inputs_give_identical_outputs() {
    let batch = [scenario_a(), scenario_b(), scenario_d()];
    let first = risks(&batch, &goff());
    let second = risks(&batch, &goff());
    assert_eq!(first, second);
}

#[test]
fn permuting_rows_permutes_outputs() {
    let mut rng = StdRng::seed_from_u64(42);
    let subjects: Vec<Subject> = (0..64)
        .map(|i| Subject {
            age: 40.0 + (i % 40) as f64,
            female: i % 2 == 0,
            black: i % 3 == 0,
            smoker: i % 5 == 0,
            total_chol: Some(150.0 + (i * 2) as f64),
            hdl: 30.0 + (i % 50) as f64,
            sbp: 100.0 + (i % 70) as f64,
            bp_meds: i % 4 == 0,
            statin: i % 6 == 0,
            diabetes: i % 7 == 0,
            bmi: 20.0 + (i % 15) as f64,
            egfr: 40.0 + (i % 90) as f64,
        })
        .collect();

    let equations = [
        goff(),
        request(EquationVersion::Khan2023, PredType::Cvd, Horizon::TenYear),
    ];
    for equation in &equations {
        let baseline = risks(&subjects, equation);
        let mut order: Vec<usize> = (0..subjects.len()).collect();
        order.shuffle(&mut rng);

        let repository = CoefficientRepository::shared().unwrap();
        let permuted_inputs = to_inputs(&subjects).take_rows(&order);
        let permuted = predict_risk(&permuted_inputs, equation, repository)
            .unwrap()
            .risk;

        let mut restored = vec![0.0; subjects.len()];
        for (position, &original) in order.iter().enumerate() {
            restored[original] = permuted[position];
        }
        assert_eq!(restored, baseline);
    }
}

#[test]
fn equivalent_level_maps_give_identical_probabilities() {
    let subjects = [scenario_a(), scenario_b()];
    let reference = risks(&subjects, &goff());

    let mut inputs = to_inputs(&subjects);
    inputs.sex = RawColumn::Integer(vec![Some(2), Some(1)]);
    inputs.race = Some(RawColumn::from(vec!["AA", " African American "]));
    inputs.smoke_current = RawColumn::Logical(vec![Some(false), Some(false)]);

    let mut levels = LevelMaps::default();
    levels.sex = LevelMap::new([("female", vec!["2", "F"]), ("male", vec!["1", "M"])]);

    let repository = CoefficientRepository::shared().unwrap();
    let recoded = predict_risk(&inputs, &goff().with_levels(levels), repository)
        .unwrap()
        .risk
        .to_vec();
    assert_eq!(recoded, reference);
}

#[test]
fn malformed_level_map_is_a_configuration_error() {
    let levels = LevelMaps::from_toml_str(
        r#"
        [sex]
        woman = ["f"]
        man = ["m"]
        "#,
    )
    .unwrap();
    let repository = CoefficientRepository::shared().unwrap();
    let err = predict_risk(
        &to_inputs(&[scenario_a()]),
        &goff().with_levels(levels),
        repository,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RiskError::Configuration(LevelMapError::WrongLevelNames {
            variable: "sex",
            ..
        })
    ));
}

#[test]
fn unequal_lengths_are_rejected_without_broadcasting() {
    let mut inputs = to_inputs(&[scenario_a(), scenario_b()]);
    inputs.sex = RawColumn::from(vec!["female"]);
    let repository = CoefficientRepository::shared().unwrap();
    let err = predict_risk(&inputs, &goff(), repository).unwrap_err();
    match err {
        RiskError::Validation(ValidationError::LengthMismatch { expected, lengths }) => {
            assert_eq!(expected, 2);
            assert!(lengths.contains(&("sex", 1)));
            assert!(lengths.contains(&("age_years", 2)));
        }
        other => panic!("Expected LengthMismatch, got {other:?}"),
    }

    inputs.sex = RawColumn::from(vec!["female"]).broadcast(2);
    assert!(predict_risk(&inputs, &goff(), repository).is_ok());
}

fn assert_non_decreasing(values: &[f64], label: &str) {
    for pair in values.windows(2) {
        assert!(
            pair[1] >= pair[0],
            "{label}: risk fell from {} to {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn pooled_cohort_risk_is_monotone_in_age_pressure_and_cholesterol() {
    for version in [EquationVersion::Goff2013, EquationVersion::Yadlowsky2018] {
        let equation = request(version, PredType::Ascvd, Horizon::TenYear);
        for female in [true, false] {
            for black in [true, false] {
                let base = Subject {
                    female,
                    black,
                    ..scenario_a()
                };
                let by_age: Vec<Subject> = (40..=79)
                    .map(|age| Subject {
                        age: age as f64,
                        ..base
                    })
                    .collect();
                let by_sbp: Vec<Subject> = (90..=200)
                    .map(|sbp| Subject {
                        sbp: sbp as f64,
                        ..base
                    })
                    .collect();
                let by_chol: Vec<Subject> = (130..=320)
                    .map(|tc| Subject {
                        total_chol: Some(tc as f64),
                        ..base
                    })
                    .collect();
                let label = format!("{version} female={female} black={black}");
                assert_non_decreasing(&risks(&by_age, &equation), &format!("{label} age"));
                assert_non_decreasing(&risks(&by_sbp, &equation), &format!("{label} sbp"));
                assert_non_decreasing(&risks(&by_chol, &equation), &format!("{label} chol"));
            }
        }
    }
}

#[test]
fn prevent_base_risk_is_monotone_above_the_pressure_knot() {
    for pred_type in [PredType::Ascvd, PredType::Cvd, PredType::Hf] {
        let equation = request(EquationVersion::Khan2023, pred_type, Horizon::TenYear);
        for female in [true, false] {
            let base = Subject {
                female,
                ..scenario_d()
            };
            let by_age: Vec<Subject> = (30..=79)
                .map(|age| Subject {
                    age: age as f64,
                    ..base
                })
                .collect();
            let by_sbp: Vec<Subject> = (110..=180)
                .map(|sbp| Subject {
                    sbp: sbp as f64,
                    ..base
                })
                .collect();
            let by_chol: Vec<Subject> = (130..=320)
                .map(|tc| Subject {
                    total_chol: Some(tc as f64),
                    ..base
                })
                .collect();
            let label = format!("{pred_type} female={female}");
            assert_non_decreasing(&risks(&by_age, &equation), &format!("{label} age"));
            assert_non_decreasing(&risks(&by_sbp, &equation), &format!("{label} sbp"));
            assert_non_decreasing(&risks(&by_chol, &equation), &format!("{label} chol"));
        }
    }
}

fn full_model_repository() -> CoefficientRepository {
    let mut repository = CoefficientRepository::bundled().unwrap();
    repository.extend(
        CoefficientRepository::from_toml_str(
            r#"
            [[Khan_2023]]
            pred_type = "ascvd"
            prevent_type = "full"
            horizon = 10
            sex = "female"
            constant = -3.0
            ln_acr = 0.2
            acr_missing = 0.5
            hba1c_diabetes = 0.1
            hba1c_no_diabetes = 0.05
            hba1c_missing = 0.3
            sdi_4_to_6 = 0.1
            sdi_7_to_10 = 0.2
            sdi_missing = 0.7

            [[Khan_2023]]
            pred_type = "ascvd"
            prevent_type = "full"
            horizon = 10
            sex = "male"
            constant = -3.0
            sdi_missing = 0.7
            "#,
        )
        .unwrap(),
    );
    repository
}

#[test]
fn full_model_uses_missing_indicators_for_optional_covariates() {
    let repository = full_model_repository();
    let subjects = [scenario_d(), scenario_d()];
    let mut inputs = to_inputs(&subjects);
    inputs.acr = Some(RawColumn::Float(vec![Some(1.0), None]));
    inputs.hba1c = Some(RawColumn::Float(vec![Some(5.3), None]));
    inputs.sdi = Some(RawColumn::Float(vec![Some(2.0), Some(2.0)]));

    let full = request(EquationVersion::Khan2023, PredType::Ascvd, Horizon::TenYear);
    let full = RiskRequest {
        descriptor: full.descriptor.with_prevent_type(PreventType::Full),
        ..full
    };
    let prediction = predict_risk(&inputs, &full, &repository).unwrap();

    assert!(prediction.missing.is_none());
    let eta = &prediction.linear_predictor;
    assert_abs_diff_eq!(eta[0], -3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(eta[1], -3.0 + 0.5 + 0.3, epsilon = 1e-12);
    assert!(prediction.risk.iter().all(|p| p.is_finite()));
}

#[test]
fn missing_sdi_for_women_is_imputed_only_when_enabled() {
    let repository = full_model_repository();
    let mut inputs = to_inputs(&[scenario_d()]);
    inputs.acr = Some(RawColumn::from(vec![1.0]));
    inputs.hba1c = Some(RawColumn::from(vec![5.3]));
    inputs.sdi = Some(RawColumn::Float(vec![None]));

    let descriptor =
        EquationDescriptor::new(PredType::Ascvd, EquationVersion::Khan2023, Horizon::TenYear)
            .with_prevent_type(PreventType::Full);
    let imputed = predict_risk(&inputs, &RiskRequest::new(descriptor), &repository).unwrap();
    assert_abs_diff_eq!(imputed.linear_predictor[0], -3.0, epsilon = 1e-12);

    let flagged = RiskRequest::new(descriptor).with_options(EngineOptions {
        impute_missing_sdi_for_female_ascvd: false,
        ..EngineOptions::default()
    });
    let flagged = predict_risk(&inputs, &flagged, &repository).unwrap();
    assert_abs_diff_eq!(flagged.linear_predictor[0], -3.0 + 0.7, epsilon = 1e-12);
}

#[test]
fn heart_failure_rows_score_without_cholesterol() {
    let complete = scenario_d();
    let no_chol = Subject {
        total_chol: None,
        statin: true,
        ..scenario_d()
    };
    let hf = request(EquationVersion::Khan2023, PredType::Hf, Horizon::TenYear);
    let repository = CoefficientRepository::shared().unwrap();
    let prediction = predict_risk(&to_inputs(&[complete, no_chol]), &hf, repository).unwrap();
    assert!(prediction.missing.is_none());
    assert!(prediction.risk[1].is_finite());
    assert_eq!(prediction.risk[0], prediction.risk[1]);

    let ascvd = request(EquationVersion::Khan2023, PredType::Ascvd, Horizon::TenYear);
    let prediction = predict_risk(&to_inputs(&[complete, no_chol]), &ascvd, repository).unwrap();
    assert!(prediction.risk[1].is_nan());
    assert!(prediction.missing.is_some());
}

#[test]
fn unbundled_prevent_variant_reports_missing_table() {
    let mut inputs = to_inputs(&[scenario_d()]);
    inputs.acr = Some(RawColumn::from(vec![30.0]));
    let descriptor =
        EquationDescriptor::new(PredType::Ascvd, EquationVersion::Khan2023, Horizon::TenYear)
            .with_prevent_type(PreventType::Acr);
    let repository = CoefficientRepository::shared().unwrap();
    let err = predict_risk(&inputs, &RiskRequest::new(descriptor), repository).unwrap_err();
    assert!(matches!(err, RiskError::Coefficients(_)));
}
