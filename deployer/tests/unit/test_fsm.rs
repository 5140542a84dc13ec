//! FSM unit tests

use deployer::deploy::fsm::{PipelineEvent, PipelineFsm, PipelineState};

#[test]
fn test_fsm_initial_state() {
    let fsm = PipelineFsm::new();
    assert_eq!(fsm.state(), PipelineState::Idle);
    assert!(fsm.error().is_none());
}

#[test]
fn test_fsm_push_pipeline_skips_artifact_state() {
    let mut fsm = PipelineFsm::new();

    fsm.process(PipelineEvent::Begin).unwrap();
    let state = fsm
        .process(PipelineEvent::SourceSynced {
            install_artifact: false,
        })
        .unwrap();
    assert_eq!(state, PipelineState::DependencyInstall);

    fsm.process(PipelineEvent::DependenciesInstalled).unwrap();
    fsm.process(PipelineEvent::Built).unwrap();
    fsm.process(PipelineEvent::RestartIssued).unwrap();
    assert_eq!(fsm.state(), PipelineState::Idle);
}

#[test]
fn test_fsm_every_running_state_can_fail() {
    let prefixes: Vec<Vec<PipelineEvent>> = vec![
        vec![PipelineEvent::Begin],
        vec![
            PipelineEvent::Begin,
            PipelineEvent::SourceSynced {
                install_artifact: true,
            },
        ],
        vec![
            PipelineEvent::Begin,
            PipelineEvent::SourceSynced {
                install_artifact: false,
            },
        ],
        vec![
            PipelineEvent::Begin,
            PipelineEvent::SourceSynced {
                install_artifact: false,
            },
            PipelineEvent::DependenciesInstalled,
        ],
        vec![
            PipelineEvent::Begin,
            PipelineEvent::SourceSynced {
                install_artifact: false,
            },
            PipelineEvent::DependenciesInstalled,
            PipelineEvent::Built,
        ],
    ];

    for prefix in prefixes {
        let mut fsm = PipelineFsm::new();
        for event in prefix {
            fsm.process(event).unwrap();
        }
        fsm.process(PipelineEvent::StepFailed("boom".to_string()))
            .unwrap();
        assert_eq!(fsm.state(), PipelineState::Failed);
        assert_eq!(fsm.error(), Some("boom"));
    }
}

#[test]
fn test_fsm_idle_cannot_fail() {
    let mut fsm = PipelineFsm::new();
    assert!(fsm
        .process(PipelineEvent::StepFailed("boom".to_string()))
        .is_err());
    assert_eq!(fsm.state(), PipelineState::Idle);
}

#[test]
fn test_fsm_steps_cannot_be_skipped() {
    let mut fsm = PipelineFsm::new();
    fsm.process(PipelineEvent::Begin).unwrap();

    assert!(fsm.process(PipelineEvent::Built).is_err());
    assert!(fsm.process(PipelineEvent::RestartIssued).is_err());
    assert_eq!(fsm.state(), PipelineState::SourceSync);
}

#[test]
fn test_fsm_failed_is_terminal() {
    let mut fsm = PipelineFsm::new();

    fsm.process(PipelineEvent::Begin).unwrap();
    fsm.process(PipelineEvent::StepFailed("error".to_string()))
        .unwrap();

    assert!(fsm.process(PipelineEvent::Begin).is_err());
    assert!(fsm.process(PipelineEvent::Built).is_err());
    assert_eq!(fsm.state(), PipelineState::Failed);
    assert_eq!(fsm.error(), Some("error"));
}
