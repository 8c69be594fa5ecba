//! The visit routing engine.
//!
//! Turns one visit request plus the current stack shape into exactly one
//! stack mutation and the session that should load the new Screen. The
//! branches are checked in a fixed order and the first one that applies wins:
//!
//! 1. a presented modal is dismissed (always, then evaluation continues)
//! 2. root path on a stack deeper than one entry: collapse, then replace
//! 3. `presentation: modal`: present over the untouched primary stack
//! 4. `action: replace` property: replace the top and force a reload
//! 5. same URL as the active Screen: replace the top without animation
//! 6. the request's action: advance pushes, replace resets, restore pops then pushes

use crate::properties::{PathProperties, PropertyAction, PropertyMap};
use crate::screen::{Screen, ScreenId};
use crate::stack::NavigationStack;
use serde::{Deserialize, Serialize};
use url::Url;

/// Caller-supplied intent for how the stack should change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitAction {
    #[default]
    Advance,
    Replace,
    Restore,
    #[serde(other)]
    Unspecified,
}

impl VisitAction {
    /// Unknown strings become [`VisitAction::Unspecified`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "advance" => Self::Advance,
            "replace" => Self::Replace,
            "restore" => Self::Restore,
            _ => Self::Unspecified,
        }
    }

    /// Unspecified actions are treated as advance.
    pub fn normalized(self) -> Self {
        match self {
            Self::Unspecified => Self::Advance,
            other => other,
        }
    }
}

impl From<PropertyAction> for VisitAction {
    fn from(action: PropertyAction) -> Self {
        match action {
            PropertyAction::Replace => Self::Replace,
            PropertyAction::Restore => Self::Restore,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisitRequest {
    pub url: Url,
    pub action: VisitAction,
    pub properties: PropertyMap,
}

impl VisitRequest {
    pub fn new(url: Url, action: VisitAction, properties: PropertyMap) -> Self {
        Self {
            url,
            action,
            properties,
        }
    }

    pub fn advance(url: Url) -> Self {
        Self::new(url, VisitAction::Advance, PropertyMap::new())
    }
}

/// Which content session loads the routed Screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Primary,
    Modal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackMutation {
    /// Pop down to the bottom entry, then replace it.
    CollapseToRoot,
    /// Primary stack untouched; the Screen is presented modally.
    PresentModal,
    /// Replace the top entry (forced reload follows).
    ReplaceTop,
    /// Replace the top entry with a fresh Screen for the same URL.
    RefreshTop,
    Push,
    /// Discard everything and start from the new Screen.
    Reset,
    /// Drop the top entry, then push.
    PopAndPush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub dismiss_modal: bool,
    pub mutation: StackMutation,
    pub target: Target,
    pub animated: bool,
    /// The primary session must reload, bypassing anything cached.
    pub force_reload: bool,
}

/// The stack shape the router decides on.
#[derive(Debug, Clone, Copy)]
pub struct RouteInput<'a> {
    pub stack: &'a NavigationStack,
    pub modal_presented: bool,
    /// URL of the Screen the primary session currently has active.
    pub active_url: Option<&'a Url>,
}

/// The modally presented Screen, if any.
#[derive(Debug, Clone, Default)]
pub struct ModalPresentation {
    screen: Option<Screen>,
}

impl ModalPresentation {
    pub fn is_presented(&self) -> bool {
        self.screen.is_some()
    }

    pub fn screen(&self) -> Option<&Screen> {
        self.screen.as_ref()
    }

    pub fn get_mut(&mut self, id: ScreenId) -> Option<&mut Screen> {
        self.screen.as_mut().filter(|s| s.id() == id)
    }

    pub fn present(&mut self, screen: Screen) {
        self.screen = Some(screen);
    }

    pub fn dismiss(&mut self) -> Option<Screen> {
        self.screen.take()
    }
}

/// What a call to [`VisitRouter::route`] did.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub plan: RoutePlan,
    /// The newly created Screen the target session must load.
    pub screen: Screen,
    /// The modal Screen torn down by branch 1, if one was presented.
    pub dismissed: Option<Screen>,
}

pub struct VisitRouter;

impl VisitRouter {
    /// Decide the mutation for `request` without touching any state.
    pub fn plan(request: &VisitRequest, input: RouteInput<'_>) -> RoutePlan {
        let dismiss_modal = input.modal_presented;
        let properties = PathProperties::from(&request.properties);

        let primary = |mutation, animated, force_reload| RoutePlan {
            dismiss_modal,
            mutation,
            target: Target::Primary,
            animated,
            force_reload,
        };

        if request.url.path() == "/" && input.stack.len() > 1 {
            return primary(StackMutation::CollapseToRoot, false, false);
        }

        if properties.is_modal() {
            return RoutePlan {
                dismiss_modal,
                mutation: StackMutation::PresentModal,
                target: Target::Modal,
                animated: true,
                force_reload: false,
            };
        }

        if properties.action == Some(PropertyAction::Replace) {
            return primary(StackMutation::ReplaceTop, false, true);
        }

        if input.active_url == Some(&request.url) {
            return primary(StackMutation::RefreshTop, false, false);
        }

        let action = properties
            .action
            .map(VisitAction::from)
            .unwrap_or(request.action)
            .normalized();

        match action {
            VisitAction::Replace => primary(StackMutation::Reset, false, false),
            VisitAction::Restore => primary(StackMutation::PopAndPush, true, false),
            VisitAction::Advance | VisitAction::Unspecified => {
                primary(StackMutation::Push, true, false)
            }
        }
    }

    /// Carry out `plan` with a Screen already bound to the request URL.
    /// Returns the dismissed modal Screen, if any.
    pub fn apply(
        plan: &RoutePlan,
        screen: Screen,
        stack: &mut NavigationStack,
        modal: &mut ModalPresentation,
    ) -> Option<Screen> {
        let dismissed = if plan.dismiss_modal {
            modal.dismiss()
        } else {
            None
        };

        match plan.mutation {
            StackMutation::CollapseToRoot => stack.collapse_to_root(screen),
            StackMutation::PresentModal => modal.present(screen),
            StackMutation::ReplaceTop | StackMutation::RefreshTop => stack.replace_top(screen),
            StackMutation::Push => stack.push(screen),
            StackMutation::Reset => stack.reset(screen),
            StackMutation::PopAndPush => stack.pop_and_push(screen),
        }

        dismissed
    }

    /// Plan and apply in one step.
    pub fn route(
        request: &VisitRequest,
        stack: &mut NavigationStack,
        modal: &mut ModalPresentation,
        active_url: Option<&Url>,
    ) -> RouteOutcome {
        let plan = Self::plan(
            request,
            RouteInput {
                stack: &*stack,
                modal_presented: modal.is_presented(),
                active_url,
            },
        );

        let screen = Screen::new(request.url.clone());
        let dismissed = Self::apply(&plan, screen.clone(), stack, modal);

        tracing::debug!(
            url = %request.url,
            action = ?request.action,
            mutation = ?plan.mutation,
            session = ?plan.target,
            depth = stack.len(),
            "visit routed"
        );

        RouteOutcome {
            plan,
            screen,
            dismissed,
        }
    }
}
