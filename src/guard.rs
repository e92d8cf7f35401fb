use crate::api::models::Role;
use crate::store::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    SignIn,
    SignUp,
    BecomeRunner,
    CustomerDashboard,
    RunnerDashboard,
    Payment,
    Tracking,
    /// Chat about one errand, opened from the customer side.
    ErrandChat,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    RedirectToSignIn,
    Redirect(View),
}

impl View {
    fn allowed_roles(self) -> Option<&'static [Role]> {
        match self {
            View::SignIn | View::SignUp | View::BecomeRunner | View::Chat => None,
            View::CustomerDashboard | View::Payment | View::Tracking | View::ErrandChat => {
                Some(&[Role::Customer])
            }
            View::RunnerDashboard => Some(&[Role::Runner]),
        }
    }

    fn is_public(self) -> bool {
        matches!(self, View::SignIn | View::SignUp | View::BecomeRunner)
    }
}

pub fn home(role: Role) -> View {
    match role {
        Role::Runner => View::RunnerDashboard,
        Role::Customer => View::CustomerDashboard,
    }
}

pub fn check(session: &SessionState, view: View) -> Access {
    let user = match (&session.user, session.is_authenticated) {
        (Some(user), true) => user,
        _ if view.is_public() => return Access::Allow,
        _ => return Access::RedirectToSignIn,
    };
    if matches!(view, View::SignIn | View::SignUp) {
        return Access::Redirect(home(user.role));
    }
    match view.allowed_roles() {
        Some(roles) if !roles.contains(&user.role) => Access::Redirect(home(user.role)),
        _ => Access::Allow,
    }
}
