//! Query envelope and the element names shared with the recorder fleet.

use quick_xml::escape::escape;

/// Command asking recorders to report the serials they hold.
pub const QUERY_COMMAND: &str = "getvsn";

/// Identifier placed in the header of outgoing queries.
pub const QUERY_IDENTIFIER: &str = "volgrid";

/// Root element of a removable-module status message.
pub const MODULE_STATUS_TAG: &str = "mark5Status";
/// Root element of a disk-array status message.
pub const ARRAY_STATUS_TAG: &str = "mark6Status";

pub const BANK_A_TAG: &str = "bankAVSN";
pub const BANK_B_TAG: &str = "bankBVSN";
pub const STATE_TAG: &str = "state";
pub const FROM_TAG: &str = "from";

/// Logical class of machines a query is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderClass {
    Module,
    DiskArray,
}

impl HolderClass {
    pub const ALL: [HolderClass; 2] = [HolderClass::Module, HolderClass::DiskArray];

    /// Destination name understood by the recorders.
    pub fn address(&self) -> &'static str {
        match self {
            HolderClass::Module => "mark5",
            HolderClass::DiskArray => "mark6",
        }
    }
}

/// Render a `getvsn` command addressed to every machine of `class`.
///
/// The process id is always `-1`: the query does not come from a rank of
/// a running job.
pub fn encode_query(sender: &str, class: HolderClass) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <difxMessage>\
         <header>\
         <from>{from}</from>\
         <to>{to}</to>\
         <mpiProcessId>-1</mpiProcessId>\
         <identifier>{QUERY_IDENTIFIER}</identifier>\
         <type>DifxCommand</type>\
         </header>\
         <body>\
         <seqNumber>0</seqNumber>\
         <difxCommand>\
         <command>{QUERY_COMMAND}</command>\
         </difxCommand>\
         </body>\
         </difxMessage>",
        from = escape(sender),
        to = class.address(),
    )
}
