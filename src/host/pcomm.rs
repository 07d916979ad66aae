//! IBM Personal Communications automation objects.
//!
//! Drives `PCOMM.autECLConnList`, `PCOMM.autECLSession` and
//! `PCOMM.autECLScreenDesc` through late-bound `IDispatch` calls. COM is
//! initialized (single-threaded apartment) when the host is created and
//! released once the host and every accessor it handed out are dropped.

use std::rc::Rc;

use tracing::trace;
use windows::Win32::System::Com::{
    CLSCTX_ALL, CLSIDFromProgID, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx,
    CoUninitialize, DISPATCH_FLAGS, DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPPARAMS, IDispatch,
};
use windows::core::{BSTR, GUID, HSTRING, IUnknown, Interface, PCWSTR, VARIANT};

use crate::error::{GreenscreenError, Result};
use crate::host::{
    ConnectionInfo, Host, OiaInhibitMatch, OperatorInfoArea, PresentationSpace,
    ScreenDescription, SearchDirection, host_int,
};
use crate::screen::Position;
use crate::session::SessionId;

const LOCALE_USER_DEFAULT: u32 = 0x0400;

const CONN_LIST: &str = "PCOMM.autECLConnList";
const SESSION: &str = "PCOMM.autECLSession";
const SCREEN_DESC: &str = "PCOMM.autECLScreenDesc";

/// Keeps COM initialized on this thread while any object is alive.
struct Apartment {
    owned: bool,
}

impl Apartment {
    fn enter() -> Rc<Self> {
        // S_FALSE (already initialized) still needs a matching uninitialize;
        // a different threading mode does not.
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        Rc::new(Self { owned: hr.is_ok() })
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        if self.owned {
            unsafe { CoUninitialize() };
        }
    }
}

/// A late-bound automation object.
#[derive(Clone)]
struct Dispatch {
    inner: IDispatch,
    // Declared last so the interface is released before COM shuts down.
    apartment: Rc<Apartment>,
}

impl Dispatch {
    fn create(prog_id: &str, apartment: &Rc<Apartment>) -> Result<Self> {
        let name = HSTRING::from(prog_id);
        let inner = unsafe {
            let clsid = CLSIDFromProgID(PCWSTR(name.as_ptr())).map_err(|e| com_error(prog_id, e))?;
            CoCreateInstance::<_, IDispatch>(&clsid, None, CLSCTX_ALL)
                .map_err(|e| com_error(prog_id, e))?
        };
        Ok(Self {
            inner,
            apartment: Rc::clone(apartment),
        })
    }

    fn wrap(value: &VARIANT, apartment: &Rc<Apartment>) -> Result<Option<Self>> {
        if value.is_empty() {
            return Ok(None);
        }
        let Ok(unknown) = IUnknown::try_from(value) else {
            return Ok(None);
        };
        let inner = unknown
            .cast::<IDispatch>()
            .map_err(|e| com_error("IDispatch", e))?;
        Ok(Some(Self {
            inner,
            apartment: Rc::clone(apartment),
        }))
    }

    fn dispid(&self, member: &str) -> Result<i32> {
        let name = HSTRING::from(member);
        let names = [PCWSTR(name.as_ptr())];
        let mut dispid = 0;
        unsafe {
            self.inner
                .GetIDsOfNames(
                    &GUID::zeroed(),
                    names.as_ptr(),
                    1,
                    LOCALE_USER_DEFAULT,
                    &mut dispid,
                )
                .map_err(|e| com_error(member, e))?;
        }
        Ok(dispid)
    }

    fn invoke(&self, member: &str, flags: DISPATCH_FLAGS, args: Vec<VARIANT>) -> Result<VARIANT> {
        trace!(member, args = args.len(), "automation call");
        let dispid = self.dispid(member)?;
        // Arguments travel in reverse order.
        let mut args: Vec<VARIANT> = args.into_iter().rev().collect();
        let params = DISPPARAMS {
            rgvarg: args.as_mut_ptr(),
            rgdispidNamedArgs: std::ptr::null_mut(),
            cArgs: args.len() as u32,
            cNamedArgs: 0,
        };
        let mut result = VARIANT::default();
        unsafe {
            self.inner
                .Invoke(
                    dispid,
                    &GUID::zeroed(),
                    LOCALE_USER_DEFAULT,
                    flags,
                    &params,
                    Some(&mut result),
                    None,
                    None,
                )
                .map_err(|e| com_error(member, e))?;
        }
        Ok(result)
    }

    fn call(&self, member: &str, args: Vec<VARIANT>) -> Result<VARIANT> {
        let flags = DISPATCH_FLAGS(DISPATCH_METHOD.0 | DISPATCH_PROPERTYGET.0);
        self.invoke(member, flags, args)
    }

    fn get(&self, member: &str) -> Result<VARIANT> {
        self.invoke(member, DISPATCH_PROPERTYGET, Vec::new())
    }

    fn get_object(&self, member: &str) -> Result<Self> {
        let value = self.get(member)?;
        Self::wrap(&value, &self.apartment)?
            .ok_or_else(|| GreenscreenError::Host(format!("{member} returned no object")))
    }
}

fn com_error(member: &str, err: windows::core::Error) -> GreenscreenError {
    GreenscreenError::Host(format!("{member}: {err}"))
}

fn int(v: i64) -> VARIANT {
    VARIANT::from(host_int(v))
}

fn pos_args(pos: Position) -> [VARIANT; 2] {
    [int(pos.row.into()), int(pos.col.into())]
}

fn text(s: &str) -> VARIANT {
    VARIANT::from(BSTR::from(s))
}

fn to_string(member: &str, v: &VARIANT) -> Result<String> {
    BSTR::try_from(v)
        .map(|s| s.to_string())
        .map_err(|e| com_error(member, e))
}

fn to_bool(member: &str, v: &VARIANT) -> Result<bool> {
    bool::try_from(v).map_err(|e| com_error(member, e))
}

fn to_i32(member: &str, v: &VARIANT) -> Result<i32> {
    i32::try_from(v).map_err(|e| com_error(member, e))
}

fn to_u16(member: &str, v: &VARIANT) -> Result<u16> {
    let n = to_i32(member, v)?;
    u16::try_from(n).map_err(|_| GreenscreenError::Host(format!("{member} returned {n}")))
}

fn connection_info(conn: &Dispatch) -> Result<ConnectionInfo> {
    let name = to_string("Name", &conn.get("Name")?)?;
    let name = name
        .chars()
        .next()
        .ok_or_else(|| GreenscreenError::Host("connection without a name".to_string()))?;
    Ok(ConnectionInfo {
        name: name.to_ascii_uppercase(),
        handle: i64::try_from(&conn.get("Handle")?).map_err(|e| com_error("Handle", e))?,
        started: to_bool("Started", &conn.get("Started")?)?,
        comm_started: to_bool("CommStarted", &conn.get("CommStarted")?)?,
        api_enabled: to_bool("APIEnabled", &conn.get("APIEnabled")?)?,
        ready: to_bool("Ready", &conn.get("Ready")?)?,
    })
}

/// The PCOMM automation object suite.
pub struct PcommHost {
    connections: Dispatch,
    apartment: Rc<Apartment>,
}

impl PcommHost {
    /// Initialize COM and create the connection list.
    pub fn new() -> Result<Self> {
        let apartment = Apartment::enter();
        let connections = Dispatch::create(CONN_LIST, &apartment)?;
        Ok(Self {
            connections,
            apartment,
        })
    }
}

impl Host for PcommHost {
    type Descriptor = PcommScreenDesc;
    type Ps = PcommPresentationSpace;
    type Oia = PcommOia;

    fn refresh_connections(&mut self) -> Result<()> {
        self.connections.call("Refresh", Vec::new())?;
        Ok(())
    }

    fn connections(&self) -> Result<Vec<ConnectionInfo>> {
        let count = to_i32("Count", &self.connections.get("Count")?)?;
        let mut infos = Vec::with_capacity(count.max(0) as usize);
        for index in 1..=count {
            let item = self.connections.call("Item", vec![int(index.into())])?;
            if let Some(conn) = Dispatch::wrap(&item, &self.apartment)? {
                infos.push(connection_info(&conn)?);
            }
        }
        Ok(infos)
    }

    fn find_connection(&self, id: SessionId) -> Result<Option<ConnectionInfo>> {
        let found = self
            .connections
            .call("FindConnectionByName", vec![text(&id.to_string())])?;
        match Dispatch::wrap(&found, &self.apartment)? {
            Some(conn) => connection_info(&conn).map(Some),
            None => Ok(None),
        }
    }

    fn bind(&mut self, id: SessionId) -> Result<(Self::Ps, Self::Oia)> {
        let session = Dispatch::create(SESSION, &self.apartment)?;
        session.call("SetConnectionByName", vec![text(&id.to_string())])?;
        let ps = session.get_object("autECLPS")?;
        let oia = session.get_object("autECLOIA")?;
        Ok((PcommPresentationSpace { ps }, PcommOia { oia }))
    }

    fn new_descriptor(&self) -> Result<Self::Descriptor> {
        Ok(PcommScreenDesc {
            desc: Dispatch::create(SCREEN_DESC, &self.apartment)?,
        })
    }
}

/// `autECLPS` accessor.
pub struct PcommPresentationSpace {
    ps: Dispatch,
}

impl PresentationSpace for PcommPresentationSpace {
    type Descriptor = PcommScreenDesc;

    fn get_text(&self, pos: Position, length: u32) -> Result<String> {
        let [row, col] = pos_args(pos);
        let v = self.ps.call("GetText", vec![row, col, int(length.into())])?;
        to_string("GetText", &v)
    }

    fn get_text_rect(&self, start: Position, end: Position) -> Result<String> {
        let [r0, c0] = pos_args(start);
        let [r1, c1] = pos_args(end);
        let v = self.ps.call("GetTextRect", vec![r0, c0, r1, c1])?;
        to_string("GetTextRect", &v)
    }

    fn set_text(&self, value: &str, pos: Position) -> Result<()> {
        let [row, col] = pos_args(pos);
        self.ps.call("SetText", vec![text(value), row, col])?;
        Ok(())
    }

    fn set_cursor(&self, pos: Position) -> Result<()> {
        let [row, col] = pos_args(pos);
        self.ps.call("SetCursorPos", vec![row, col])?;
        Ok(())
    }

    fn cursor_row(&self) -> Result<u16> {
        to_u16("CursorPosRow", &self.ps.get("CursorPosRow")?)
    }

    fn cursor_col(&self) -> Result<u16> {
        to_u16("CursorPosCol", &self.ps.get("CursorPosCol")?)
    }

    fn num_rows(&self) -> Result<u16> {
        to_u16("NumRows", &self.ps.get("NumRows")?)
    }

    fn num_cols(&self) -> Result<u16> {
        to_u16("NumCols", &self.ps.get("NumCols")?)
    }

    fn send_keys(&self, keys: &str) -> Result<()> {
        self.ps.call("SendKeys", vec![text(keys)])?;
        Ok(())
    }

    fn wait(&self, ms: u32) -> Result<()> {
        self.ps.call("Wait", vec![int(ms.into())])?;
        Ok(())
    }

    fn wait_for_cursor(&self, pos: Position, timeout_ms: u32) -> Result<bool> {
        let [row, col] = pos_args(pos);
        let v = self
            .ps
            .call("WaitForCursor", vec![row, col, int(timeout_ms.into())])?;
        to_bool("WaitForCursor", &v)
    }

    fn wait_for_string(&self, value: &str, pos: Position, timeout_ms: u32) -> Result<bool> {
        let [row, col] = pos_args(pos);
        let v = self.ps.call(
            "WaitForString",
            vec![text(value), row, col, int(timeout_ms.into())],
        )?;
        to_bool("WaitForString", &v)
    }

    fn search_text(
        &self,
        value: &str,
        direction: SearchDirection,
        start: Position,
    ) -> Result<bool> {
        let [row, col] = pos_args(start);
        let v = self.ps.call(
            "SearchText",
            vec![text(value), int(direction.code().into()), row, col],
        )?;
        to_bool("SearchText", &v)
    }

    fn wait_for_screen(&self, desc: &Self::Descriptor, timeout_ms: u32) -> Result<bool> {
        let unknown: IUnknown = desc
            .desc
            .inner
            .cast()
            .map_err(|e| com_error("WaitForScreen", e))?;
        let v = self.ps.call(
            "WaitForScreen",
            vec![VARIANT::from(unknown), int(timeout_ms.into())],
        )?;
        to_bool("WaitForScreen", &v)
    }
}

/// `autECLOIA` accessor.
pub struct PcommOia {
    oia: Dispatch,
}

impl OperatorInfoArea for PcommOia {
    fn input_inhibited(&self) -> Result<u32> {
        let code = to_i32("InputInhibited", &self.oia.get("InputInhibited")?)?;
        Ok(code.max(0) as u32)
    }

    fn wait_for_input_ready(&self, timeout_ms: u32) -> Result<bool> {
        let v = self
            .oia
            .call("WaitForInputReady", vec![int(timeout_ms.into())])?;
        to_bool("WaitForInputReady", &v)
    }
}

/// `autECLScreenDesc` object.
pub struct PcommScreenDesc {
    desc: Dispatch,
}

impl ScreenDescription for PcommScreenDesc {
    fn add_cursor_pos(&mut self, pos: Position) -> Result<()> {
        let [row, col] = pos_args(pos);
        self.desc.call("AddCursorPos", vec![row, col])?;
        Ok(())
    }

    fn add_string(&mut self, value: &str, pos: Position, case_sensitive: bool) -> Result<()> {
        let [row, col] = pos_args(pos);
        self.desc.call(
            "AddString",
            vec![text(value), row, col, VARIANT::from(case_sensitive)],
        )?;
        Ok(())
    }

    fn add_string_in_rect(
        &mut self,
        value: &str,
        start: Position,
        end: Position,
        case_sensitive: bool,
    ) -> Result<()> {
        let [r0, c0] = pos_args(start);
        let [r1, c1] = pos_args(end);
        self.desc.call(
            "AddStringInRect",
            vec![text(value), r0, c0, r1, c1, VARIANT::from(case_sensitive)],
        )?;
        Ok(())
    }

    fn add_num_fields(&mut self, count: u32) -> Result<()> {
        self.desc.call("AddNumFields", vec![int(count.into())])?;
        Ok(())
    }

    fn add_num_input_fields(&mut self, count: u32) -> Result<()> {
        self.desc
            .call("AddNumInputFields", vec![int(count.into())])?;
        Ok(())
    }

    fn add_oia_inhibit_status(&mut self, status: OiaInhibitMatch) -> Result<()> {
        self.desc
            .call("AddOIAInhibitStatus", vec![int(status.code().into())])?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.desc.call("Clear", Vec::new())?;
        Ok(())
    }
}
