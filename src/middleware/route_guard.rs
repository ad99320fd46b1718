//! Navigation guard: decides where a route request actually lands given the
//! signed-in user's claims, and keeps the refresh timer armed on protected views.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    models::{Claims, PlanStatus},
    scheduler::{RefreshScheduler, SchedulerState, TokenRefresher},
    session::AuthSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    VerifyEmail,
    Plans,
    PlanWaiting,
    Dashboard,
    Patients,
    Appointments,
    Treatments,
    Inventory,
    Employees,
    Expenses,
    Finance,
    AdminHome,
    AdminPlans,
    AdminPayments,
}

impl Route {
    pub fn is_protected(self) -> bool {
        !matches!(self, Route::Login | Route::Register)
    }

    pub fn is_admin_only(self) -> bool {
        matches!(self, Route::AdminHome | Route::AdminPlans | Route::AdminPayments)
    }

    fn is_plan_page(self) -> bool {
        matches!(self, Route::Plans | Route::PlanWaiting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
}

/// Where a signed-in user lands after login.
pub fn landing(claims: &Claims) -> Route {
    if !claims.email_verified {
        Route::VerifyEmail
    } else if claims.is_admin() {
        Route::AdminHome
    } else {
        match claims.plan_status {
            Some(PlanStatus::Active) => Route::Dashboard,
            Some(PlanStatus::Waiting) => Route::PlanWaiting,
            _ => Route::Plans,
        }
    }
}

pub fn decide(route: Route, claims: Option<&Claims>) -> GuardDecision {
    let Some(claims) = claims else {
        return if route.is_protected() {
            GuardDecision::Redirect(Route::Login)
        } else {
            GuardDecision::Allow
        };
    };

    if !route.is_protected() {
        return GuardDecision::Redirect(landing(claims));
    }

    if !claims.email_verified {
        return match route {
            Route::VerifyEmail => GuardDecision::Allow,
            _ => GuardDecision::Redirect(Route::VerifyEmail),
        };
    }
    if route == Route::VerifyEmail {
        return GuardDecision::Redirect(landing(claims));
    }

    if claims.is_admin() {
        return GuardDecision::Allow;
    }
    if route.is_admin_only() {
        return GuardDecision::Redirect(Route::Dashboard);
    }

    match (claims.plan_status, route) {
        (Some(PlanStatus::Active), Route::PlanWaiting) => GuardDecision::Redirect(Route::Dashboard),
        (Some(PlanStatus::Active), _) => GuardDecision::Allow,
        (_, r) if r.is_plan_page() => GuardDecision::Allow,
        _ => GuardDecision::Redirect(landing(claims)),
    }
}

/// Follows guard redirects on every navigation and keeps the proactive
/// refresh timer armed while a protected view is shown.
pub struct Navigator {
    session: AuthSession,
    refresher: Arc<dyn TokenRefresher>,
    lead: Duration,
    current: Option<Route>,
    scheduler: Option<RefreshScheduler>,
}

const MAX_REDIRECTS: usize = 4;

impl Navigator {
    pub fn new(session: AuthSession, refresher: Arc<dyn TokenRefresher>, lead: Duration) -> Self {
        Self {
            session,
            refresher,
            lead,
            current: None,
            scheduler: None,
        }
    }

    /// Must be called inside a tokio runtime; returns the route actually shown.
    pub fn navigate(&mut self, requested: Route) -> Route {
        let mut route = requested;
        for _ in 0..MAX_REDIRECTS {
            match decide(route, self.session.claims().as_ref()) {
                GuardDecision::Allow => break,
                GuardDecision::Redirect(next) => {
                    tracing::debug!(from = ?route, to = ?next, "guard redirect");
                    route = next;
                }
            }
        }

        if route.is_protected() && self.session.is_authenticated() {
            let running = self.scheduler.as_ref().is_some_and(RefreshScheduler::is_running);
            if !running {
                self.scheduler = Some(RefreshScheduler::start(
                    self.session.clone(),
                    self.refresher.clone(),
                    self.lead,
                ));
            }
        } else {
            self.scheduler = None;
        }

        self.current = Some(route);
        route
    }

    /// Leave all guarded views; cancels the refresh timer.
    pub fn leave(&mut self) {
        self.scheduler = None;
        self.current = None;
    }

    pub fn current(&self) -> Option<Route> {
        self.current
    }

    pub fn scheduler_state(&self) -> Option<SchedulerState> {
        self.scheduler.as_ref().map(RefreshScheduler::state)
    }
}
