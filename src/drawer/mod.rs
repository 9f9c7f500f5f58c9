//! Mobile navigation drawer.
//!
//! The controller owns the drawer's state and turns UI events into a list of
//! [`DrawerEffect`]s for the host to carry out (attribute changes, focus
//! moves, scroll lock, listener wiring). One controller is created per
//! mounted drawer; `init()` wires it up and `teardown()` undoes everything.

use crate::render::html::{escape_attr, escape_text};

pub const DRAWER_ID: &str = "drawer";
pub const BACKDROP_ID: &str = "backdrop";
/// Viewports at least this wide show the navigation inline.
pub const DESKTOP_MIN_WIDTH: u32 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Part {
    Toggle,
    Drawer,
    Backdrop,
}

/// Listeners the controller asks the host to attach or detach.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listener {
    ToggleClick,
    CloseClick,
    EscapeKey,
    FocusTrap,
    BackdropClick,
    Resize,
}

/// Opaque handle to whatever had focus before the drawer opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusTarget {
    FirstInDrawer,
    LastInDrawer,
    Drawer,
    Toggle,
    /// Falls back to the toggle when the element is no longer attached.
    Previous(FocusHandle),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawerEffect {
    SetAttr {
        part: Part,
        name: &'static str,
        value: &'static str,
    },
    AddClass {
        part: Part,
        class: &'static str,
    },
    RemoveClass {
        part: Part,
        class: &'static str,
    },
    SetHidden {
        part: Part,
        hidden: bool,
    },
    LockScroll,
    UnlockScroll,
    Focus {
        target: FocusTarget,
        /// Wait one frame so the open transition has started.
        next_frame: bool,
    },
    PreventDefault,
    StopPropagation,
    Listen(Listener),
    Unlisten(Listener),
}

/// Where keyboard focus currently is among the drawer's visible focusable
/// elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TabContext {
    pub focusables: usize,
    pub active_index: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawerEvent {
    ToggleClick { active: Option<FocusHandle> },
    CloseClick,
    /// `on_backdrop` is false when the click target is inside the panel.
    BackdropClick { on_backdrop: bool },
    Escape,
    Tab { shift: bool, context: TabContext },
    Resize { width: u32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawerOptions {
    pub reduced_motion: bool,
    /// The toggle already declares `aria-controls`.
    pub toggle_has_controls: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawerState {
    pub mounted: bool,
    pub open: bool,
    pub last_focus: Option<FocusHandle>,
}

#[derive(Clone, Debug, Default)]
pub struct DrawerController {
    options: DrawerOptions,
    state: DrawerState,
}

const OPEN_LISTENERS: [Listener; 4] = [
    Listener::EscapeKey,
    Listener::FocusTrap,
    Listener::BackdropClick,
    Listener::Resize,
];

impl DrawerController {
    pub fn new(options: DrawerOptions) -> Self {
        Self {
            options,
            state: DrawerState::default(),
        }
    }

    pub fn state(&self) -> &DrawerState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.open
    }

    /// Accessibility bootstrap and permanent listeners. Calling it on a
    /// mounted controller does nothing.
    pub fn init(&mut self) -> Vec<DrawerEffect> {
        if self.state.mounted {
            return Vec::new();
        }
        self.state = DrawerState {
            mounted: true,
            ..Default::default()
        };

        let mut fx = vec![
            DrawerEffect::SetAttr {
                part: Part::Drawer,
                name: "role",
                value: "dialog",
            },
            DrawerEffect::SetAttr {
                part: Part::Drawer,
                name: "aria-modal",
                value: "true",
            },
            DrawerEffect::SetAttr {
                part: Part::Drawer,
                name: "aria-hidden",
                value: "true",
            },
            DrawerEffect::SetHidden {
                part: Part::Backdrop,
                hidden: true,
            },
        ];
        if !self.options.toggle_has_controls {
            fx.push(DrawerEffect::SetAttr {
                part: Part::Toggle,
                name: "aria-controls",
                value: DRAWER_ID,
            });
        }
        fx.push(DrawerEffect::SetAttr {
            part: Part::Toggle,
            name: "aria-expanded",
            value: "false",
        });
        fx.push(DrawerEffect::Listen(Listener::ToggleClick));
        fx.push(DrawerEffect::Listen(Listener::CloseClick));
        fx
    }

    /// Closes the drawer if needed and detaches every listener.
    pub fn teardown(&mut self) -> Vec<DrawerEffect> {
        if !self.state.mounted {
            return Vec::new();
        }
        let mut fx = self.close(false);
        fx.push(DrawerEffect::Unlisten(Listener::ToggleClick));
        fx.push(DrawerEffect::Unlisten(Listener::CloseClick));
        self.state = DrawerState::default();
        fx
    }

    pub fn handle(&mut self, event: DrawerEvent) -> Vec<DrawerEffect> {
        if !self.state.mounted {
            return Vec::new();
        }
        match event {
            DrawerEvent::ToggleClick { active } => {
                let mut fx = vec![DrawerEffect::PreventDefault];
                if self.state.open {
                    fx.extend(self.close(true));
                } else {
                    fx.extend(self.open(active));
                }
                fx
            }
            DrawerEvent::CloseClick => {
                let mut fx = vec![DrawerEffect::PreventDefault];
                fx.extend(self.close(true));
                fx
            }
            DrawerEvent::BackdropClick { on_backdrop } => {
                if on_backdrop {
                    self.close(true)
                } else {
                    Vec::new()
                }
            }
            DrawerEvent::Escape => {
                if !self.state.open {
                    return Vec::new();
                }
                let mut fx = vec![DrawerEffect::StopPropagation];
                fx.extend(self.close(true));
                fx
            }
            DrawerEvent::Tab { shift, context } => self.trap_focus(shift, context),
            DrawerEvent::Resize { width } => {
                if width >= DESKTOP_MIN_WIDTH && self.state.open {
                    self.close(true)
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn open(&mut self, active: Option<FocusHandle>) -> Vec<DrawerEffect> {
        if self.state.open {
            return Vec::new();
        }
        self.state.open = true;
        self.state.last_focus = active;

        let mut fx = vec![
            DrawerEffect::AddClass {
                part: Part::Drawer,
                class: "open",
            },
            DrawerEffect::SetAttr {
                part: Part::Drawer,
                name: "aria-hidden",
                value: "false",
            },
            DrawerEffect::SetAttr {
                part: Part::Toggle,
                name: "aria-expanded",
                value: "true",
            },
            DrawerEffect::SetHidden {
                part: Part::Backdrop,
                hidden: false,
            },
            DrawerEffect::LockScroll,
            DrawerEffect::Focus {
                target: FocusTarget::FirstInDrawer,
                next_frame: !self.options.reduced_motion,
            },
        ];
        fx.extend(OPEN_LISTENERS.iter().copied().map(DrawerEffect::Listen));
        fx
    }

    fn close(&mut self, restore_focus: bool) -> Vec<DrawerEffect> {
        if !self.state.open {
            return Vec::new();
        }
        self.state.open = false;
        let previous = self.state.last_focus.take();

        let mut fx = vec![
            DrawerEffect::RemoveClass {
                part: Part::Drawer,
                class: "open",
            },
            DrawerEffect::SetAttr {
                part: Part::Drawer,
                name: "aria-hidden",
                value: "true",
            },
            DrawerEffect::SetAttr {
                part: Part::Toggle,
                name: "aria-expanded",
                value: "false",
            },
            DrawerEffect::SetHidden {
                part: Part::Backdrop,
                hidden: true,
            },
            DrawerEffect::UnlockScroll,
        ];
        if restore_focus {
            fx.push(DrawerEffect::Focus {
                target: previous
                    .map(FocusTarget::Previous)
                    .unwrap_or(FocusTarget::Toggle),
                next_frame: false,
            });
        }
        fx.extend(OPEN_LISTENERS.iter().copied().map(DrawerEffect::Unlisten));
        fx
    }

    fn trap_focus(&self, shift: bool, ctx: TabContext) -> Vec<DrawerEffect> {
        if !self.state.open {
            return Vec::new();
        }
        if ctx.focusables == 0 {
            return vec![
                DrawerEffect::PreventDefault,
                DrawerEffect::Focus {
                    target: FocusTarget::Drawer,
                    next_frame: false,
                },
            ];
        }
        let last = ctx.focusables - 1;
        let target = match (shift, ctx.active_index) {
            (true, Some(0)) => FocusTarget::LastInDrawer,
            (false, Some(i)) if i == last => FocusTarget::FirstInDrawer,
            _ => return Vec::new(),
        };
        vec![
            DrawerEffect::PreventDefault,
            DrawerEffect::Focus {
                target,
                next_frame: false,
            },
        ]
    }
}

fn attrs_for(effects: &[DrawerEffect], part: Part) -> String {
    effects
        .iter()
        .filter_map(|e| match e {
            DrawerEffect::SetAttr {
                part: p,
                name,
                value,
            } if *p == part => Some(format!(r#" {}="{}""#, name, escape_attr(value))),
            DrawerEffect::SetHidden { part: p, hidden: true } if *p == part => {
                Some(" hidden".to_string())
            }
            _ => None,
        })
        .collect()
}

/// Initial markup of the drawer in its closed state: toggle button, panel
/// holding `nav_html`, and backdrop.
pub fn shell_markup(title: &str, nav_html: &str) -> String {
    let fx = DrawerController::new(DrawerOptions::default()).init();
    format!(
        concat!(
            r#"<button class="nav-toggle" type="button"{toggle}><span class="visually-hidden">{title}</span>☰</button>"#,
            r#"<aside id="{drawer_id}" class="drawer"{drawer} tabindex="-1">"#,
            r#"<button class="drawer__close" type="button" aria-label="close">×</button>{nav}</aside>"#,
            r#"<div id="{backdrop_id}" class="backdrop"{backdrop}></div>"#,
        ),
        toggle = attrs_for(&fx, Part::Toggle),
        title = escape_text(title),
        drawer_id = DRAWER_ID,
        drawer = attrs_for(&fx, Part::Drawer),
        nav = nav_html,
        backdrop_id = BACKDROP_ID,
        backdrop = attrs_for(&fx, Part::Backdrop),
    )
}
