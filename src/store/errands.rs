use crate::api::models::{Errand, ErrandStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrandState {
    pub errands: Vec<Errand>,
    /// The Accepted or In Progress errand between the viewer and the open
    /// chat counterpart, if any.
    pub active_request: Option<Errand>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrandsAction {
    FetchRequested,
    FetchSucceeded(Vec<Errand>),
    FetchFailed(String),
    /// A single errand looked up by id.
    Fetched(Errand),
    CreateRequested,
    Created(Errand),
    CreateFailed(String),
    StatusUpdateRequested,
    StatusUpdated(Errand),
    StatusUpdateFailed(String),
    /// Errands shared with the open chat counterpart.
    SharedLoaded(Vec<Errand>),
    ClearActiveRequest,
}

/// Runner dashboard tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerTab {
    Available,
    Active,
    Completed,
}

pub fn reduce(state: &mut ErrandState, action: ErrandsAction) {
    match action {
        ErrandsAction::FetchRequested
        | ErrandsAction::CreateRequested
        | ErrandsAction::StatusUpdateRequested => {
            state.is_loading = true;
            state.error = None;
        }
        ErrandsAction::FetchSucceeded(errands) => {
            state.is_loading = false;
            state.errands = errands;
        }
        ErrandsAction::FetchFailed(error)
        | ErrandsAction::CreateFailed(error)
        | ErrandsAction::StatusUpdateFailed(error) => {
            state.is_loading = false;
            state.error = Some(error);
        }
        ErrandsAction::Fetched(errand) => {
            state.is_loading = false;
            match state.errands.iter_mut().find(|e| e.id == errand.id) {
                Some(slot) => *slot = errand,
                None => state.errands.push(errand),
            }
        }
        ErrandsAction::Created(errand) => {
            state.is_loading = false;
            state.errands.insert(0, errand);
        }
        ErrandsAction::StatusUpdated(errand) => {
            state.is_loading = false;
            if let Some(slot) = state.errands.iter_mut().find(|e| e.id == errand.id) {
                *slot = errand.clone();
            }
            if state.active_request.as_ref().is_some_and(|r| r.id == errand.id) {
                state.active_request = Some(errand);
            }
        }
        ErrandsAction::SharedLoaded(errands) => {
            for errand in &errands {
                if let Some(slot) = state.errands.iter_mut().find(|e| e.id == errand.id) {
                    *slot = errand.clone();
                }
            }
            state.active_request = errands
                .into_iter()
                .find(|e| matches!(e.status, ErrandStatus::Accepted | ErrandStatus::InProgress));
        }
        ErrandsAction::ClearActiveRequest => state.active_request = None,
    }
}

impl ErrandState {
    pub fn find(&self, id: &str) -> Option<&Errand> {
        self.errands.iter().find(|e| e.id == id)
    }

    /// Customer dashboard: everything not yet finished.
    pub fn active(&self) -> impl Iterator<Item = &Errand> {
        self.errands.iter().filter(|e| {
            matches!(e.status, ErrandStatus::Pending | ErrandStatus::Accepted | ErrandStatus::InProgress)
        })
    }

    pub fn completed(&self) -> impl Iterator<Item = &Errand> {
        self.errands.iter().filter(|e| e.status == ErrandStatus::Completed)
    }

    /// The errand the customer dashboard highlights: one a runner is on,
    /// else the newest unfinished one.
    pub fn current(&self) -> Option<&Errand> {
        self.active()
            .find(|e| matches!(e.status, ErrandStatus::Accepted | ErrandStatus::InProgress))
            .or_else(|| self.active().next())
    }

    pub fn runner_tab<'a>(&'a self, tab: RunnerTab, runner_id: &'a str) -> impl Iterator<Item = &'a Errand> + 'a {
        self.errands.iter().filter(move |e| match tab {
            RunnerTab::Available => e.status == ErrandStatus::Pending,
            RunnerTab::Active => {
                matches!(e.status, ErrandStatus::Accepted | ErrandStatus::InProgress) && e.runner_is(runner_id)
            }
            RunnerTab::Completed => e.status == ErrandStatus::Completed && e.runner_is(runner_id),
        })
    }

    pub fn runner_earnings(&self, runner_id: &str) -> f64 {
        self.runner_tab(RunnerTab::Completed, runner_id).map(|e| e.price).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::UserRef;

    fn errand(id: &str, status: ErrandStatus) -> Errand {
        Errand {
            id: id.into(),
            title: format!("Errand {id}"),
            description: String::new(),
            pickup: "Victoria Island".into(),
            dropoff: "Ikoyi".into(),
            price: 1000.0,
            status,
            runner: None,
            customer: None,
            tracking_id: None,
            created_at: None,
        }
    }

    fn assigned(id: &str, status: ErrandStatus, runner: &str, price: f64) -> Errand {
        Errand { runner: Some(UserRef::Id(runner.into())), price, ..errand(id, status) }
    }

    #[test]
    fn created_errand_goes_to_the_head() {
        let mut state = ErrandState::default();
        reduce(&mut state, ErrandsAction::FetchSucceeded(vec![errand("old", ErrandStatus::Pending)]));
        reduce(&mut state, ErrandsAction::CreateRequested);
        assert!(state.is_loading);
        reduce(&mut state, ErrandsAction::Created(errand("new", ErrandStatus::Pending)));

        assert!(!state.is_loading);
        assert_eq!(state.errands[0].id, "new");
        assert_eq!(state.errands.len(), 2);
    }

    #[test]
    fn fetched_by_id_replaces_or_appends() {
        let mut state = ErrandState::default();
        reduce(&mut state, ErrandsAction::FetchSucceeded(vec![errand("a", ErrandStatus::Pending)]));
        reduce(&mut state, ErrandsAction::Fetched(errand("a", ErrandStatus::Accepted)));
        reduce(&mut state, ErrandsAction::Fetched(errand("b", ErrandStatus::Pending)));

        assert_eq!(state.errands.len(), 2);
        assert_eq!(state.find("a").unwrap().status, ErrandStatus::Accepted);
        assert_eq!(state.errands[1].id, "b");
    }

    #[test]
    fn status_update_replaces_record_and_active_request() {
        let mut state = ErrandState::default();
        reduce(&mut state, ErrandsAction::FetchSucceeded(vec![errand("a", ErrandStatus::Accepted)]));
        reduce(&mut state, ErrandsAction::SharedLoaded(vec![errand("a", ErrandStatus::Accepted)]));
        reduce(&mut state, ErrandsAction::StatusUpdated(errand("a", ErrandStatus::InProgress)));

        assert_eq!(state.find("a").unwrap().status, ErrandStatus::InProgress);
        assert_eq!(state.active_request.as_ref().unwrap().status, ErrandStatus::InProgress);
    }

    #[test]
    fn failed_update_leaves_record_untouched() {
        let mut state = ErrandState::default();
        reduce(&mut state, ErrandsAction::FetchSucceeded(vec![errand("a", ErrandStatus::Pending)]));
        reduce(&mut state, ErrandsAction::StatusUpdateRequested);
        reduce(&mut state, ErrandsAction::StatusUpdateFailed("Failed to update status".into()));

        assert_eq!(state.find("a").unwrap().status, ErrandStatus::Pending);
        assert_eq!(state.error.as_deref(), Some("Failed to update status"));
        assert!(!state.is_loading);
    }

    #[test]
    fn shared_errands_pick_the_live_request() {
        let mut state = ErrandState::default();
        reduce(
            &mut state,
            ErrandsAction::SharedLoaded(vec![
                errand("done", ErrandStatus::Completed),
                errand("live", ErrandStatus::InProgress),
                errand("waiting", ErrandStatus::Accepted),
            ]),
        );
        assert_eq!(state.active_request.as_ref().unwrap().id, "live");

        reduce(&mut state, ErrandsAction::SharedLoaded(vec![errand("p", ErrandStatus::Pending)]));
        assert!(state.active_request.is_none());
    }

    #[test]
    fn customer_dashboard_selectors() {
        let mut state = ErrandState::default();
        reduce(
            &mut state,
            ErrandsAction::FetchSucceeded(vec![
                errand("p", ErrandStatus::Pending),
                errand("a", ErrandStatus::Accepted),
                errand("c", ErrandStatus::Completed),
                errand("x", ErrandStatus::Cancelled),
            ]),
        );
        assert_eq!(state.active().count(), 2);
        assert_eq!(state.completed().count(), 1);
        assert_eq!(state.current().unwrap().id, "a");

        let only_pending = ErrandState { errands: vec![errand("p", ErrandStatus::Pending)], ..Default::default() };
        assert_eq!(only_pending.current().unwrap().id, "p");
        assert!(ErrandState::default().current().is_none());
    }

    #[test]
    fn runner_tabs_and_earnings() {
        let state = ErrandState {
            errands: vec![
                errand("open", ErrandStatus::Pending),
                assigned("mine", ErrandStatus::Accepted, "r1", 1500.0),
                assigned("theirs", ErrandStatus::InProgress, "r2", 1500.0),
                assigned("done1", ErrandStatus::Completed, "r1", 2500.0),
                assigned("done2", ErrandStatus::Completed, "r1", 4000.0),
                assigned("done3", ErrandStatus::Completed, "r2", 3000.0),
            ],
            ..Default::default()
        };
        let ids = |tab| state.runner_tab(tab, "r1").map(|e| e.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(RunnerTab::Available), ["open"]);
        assert_eq!(ids(RunnerTab::Active), ["mine"]);
        assert_eq!(ids(RunnerTab::Completed), ["done1", "done2"]);
        assert_eq!(state.runner_earnings("r1"), 6500.0);
    }
}
