//! ActiveSync WBXML codepages.
//!
//! WBXML addresses elements by number instead of by name. Every tag value carries its codepage
//! (the namespace) in the high byte and the element within that page in the low byte, so
//! `FolderHierarchy:FolderSync` is `0x0716`: page 7, element `0x16`.
//!
//! [`CODEPAGES`] is the registry compiled from the tables ActiveSync clients need. It is what the
//! command transport uses to turn a numeric tag into the command name that goes on the wire.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// A named table of WBXML tags.
#[derive(Debug, Clone, Copy)]
pub struct Codepage {
    /// The codepage name, e.g. `"FolderHierarchy"`.
    pub name: &'static str,
    /// Element name to tag value. All values share the same high byte.
    pub tags: &'static [(&'static str, u16)],
}

/// Lookup tables compiled from a set of [`Codepage`]s.
///
/// The input tables are static configuration. Two preconditions are not checked at runtime:
/// every tag in a page must share its high byte, and no numeric tag may appear in two pages.
/// Violating either only yields wrong names, never a panic.
#[derive(Debug)]
pub struct CodepageRegistry {
    pages: Vec<Codepage>,
    tag_names: HashMap<u16, &'static str>,
    namespace_names: HashMap<u8, &'static str>,
}

impl CodepageRegistry {
    /// Build the `tag -> name` and `namespace -> codepage name` maps.
    ///
    /// Pages with an empty tag table are kept for [`CodepageRegistry::tag`] lookups but
    /// contribute nothing to either map.
    pub fn compile(pages: &[Codepage]) -> CodepageRegistry {
        let mut tag_names = HashMap::new();
        let mut namespace_names = HashMap::new();

        for page in pages {
            let Some(&(_, first)) = page.tags.first() else {
                continue;
            };
            namespace_names.insert(namespace_of(first), page.name);

            for &(name, value) in page.tags {
                tag_names.insert(value, name);
            }
        }

        CodepageRegistry {
            pages: pages.to_vec(),
            tag_names,
            namespace_names,
        }
    }

    /// The element name for a numeric tag, e.g. `0x0716 -> "FolderSync"`.
    pub fn tag_name(&self, tag: u16) -> Option<&'static str> {
        self.tag_names.get(&tag).copied()
    }

    /// The codepage name for a namespace id, e.g. `7 -> "FolderHierarchy"`.
    pub fn namespace_name(&self, namespace: u8) -> Option<&'static str> {
        self.namespace_names.get(&namespace).copied()
    }

    /// Look a tag up by codepage and element name, e.g. `("Provision", "Provision") -> 0x0E05`.
    pub fn tag(&self, page: &str, name: &str) -> Option<u16> {
        self.pages
            .iter()
            .find(|p| p.name == page)?
            .tags
            .iter()
            .find(|&&(n, _)| n == name)
            .map(|&(_, value)| value)
    }

    /// Iterate over the codepages this registry was compiled from.
    pub fn pages(&self) -> impl Iterator<Item = &Codepage> {
        self.pages.iter()
    }
}

/// The namespace (codepage number) a tag belongs to.
pub fn namespace_of(tag: u16) -> u8 {
    (tag >> 8) as u8
}

lazy_static! {
    /// The registry of every ActiveSync codepage this crate knows about.
    pub static ref CODEPAGES: CodepageRegistry = CodepageRegistry::compile(ACTIVESYNC);
}

/// Raw ActiveSync codepage tables.
pub static ACTIVESYNC: &[Codepage] = &[
    Codepage {
        name: "AirSync",
        tags: &[
            ("Sync", 0x0005),
            ("Responses", 0x0006),
            ("Add", 0x0007),
            ("Change", 0x0008),
            ("Delete", 0x0009),
            ("Fetch", 0x000A),
            ("SyncKey", 0x000B),
            ("ClientId", 0x000C),
            ("ServerId", 0x000D),
            ("Status", 0x000E),
            ("Collection", 0x000F),
            ("Class", 0x0010),
            ("CollectionId", 0x0012),
            ("GetChanges", 0x0013),
            ("MoreAvailable", 0x0014),
            ("WindowSize", 0x0015),
            ("Commands", 0x0016),
            ("Options", 0x0017),
            ("FilterType", 0x0018),
            ("Conflict", 0x001B),
            ("Collections", 0x001C),
            ("ApplicationData", 0x001D),
            ("DeletesAsMoves", 0x001E),
            ("Supported", 0x0020),
            ("SoftDelete", 0x0021),
            ("MIMESupport", 0x0022),
            ("MIMETruncation", 0x0023),
            ("Wait", 0x0024),
            ("Limit", 0x0025),
            ("Partial", 0x0026),
            ("ConversationMode", 0x0027),
            ("MaxItems", 0x0028),
            ("HeartbeatInterval", 0x0029),
        ],
    },
    Codepage {
        name: "Contacts",
        tags: &[
            ("Anniversary", 0x0105),
            ("AssistantName", 0x0106),
            ("AssistantPhoneNumber", 0x0107),
            ("Birthday", 0x0108),
            ("Business2PhoneNumber", 0x010C),
            ("BusinessAddressCity", 0x010D),
            ("BusinessAddressCountry", 0x010E),
            ("BusinessAddressPostalCode", 0x010F),
            ("BusinessAddressState", 0x0110),
            ("BusinessAddressStreet", 0x0111),
            ("BusinessFaxNumber", 0x0112),
            ("BusinessPhoneNumber", 0x0113),
            ("CarPhoneNumber", 0x0114),
            ("Categories", 0x0115),
            ("Category", 0x0116),
            ("Children", 0x0117),
            ("Child", 0x0118),
            ("CompanyName", 0x0119),
            ("Department", 0x011A),
            ("Email1Address", 0x011B),
            ("Email2Address", 0x011C),
            ("Email3Address", 0x011D),
            ("FileAs", 0x011E),
            ("FirstName", 0x011F),
            ("Home2PhoneNumber", 0x0120),
            ("HomeAddressCity", 0x0121),
            ("HomeAddressCountry", 0x0122),
            ("HomeAddressPostalCode", 0x0123),
            ("HomeAddressState", 0x0124),
            ("HomeAddressStreet", 0x0125),
            ("HomeFaxNumber", 0x0126),
            ("HomePhoneNumber", 0x0127),
            ("JobTitle", 0x0128),
            ("LastName", 0x0129),
            ("MiddleName", 0x012A),
            ("MobilePhoneNumber", 0x012B),
            ("OfficeLocation", 0x012C),
            ("OtherAddressCity", 0x012D),
            ("OtherAddressCountry", 0x012E),
            ("OtherAddressPostalCode", 0x012F),
            ("OtherAddressState", 0x0130),
            ("OtherAddressStreet", 0x0131),
            ("PagerNumber", 0x0132),
            ("RadioPhoneNumber", 0x0133),
            ("Spouse", 0x0134),
            ("Suffix", 0x0135),
            ("Title", 0x0136),
            ("WebPage", 0x0137),
            ("YomiCompanyName", 0x0138),
            ("YomiFirstName", 0x0139),
            ("YomiLastName", 0x013A),
            ("Picture", 0x013C),
            ("Alias", 0x013D),
            ("WeightedRank", 0x013E),
        ],
    },
    Codepage {
        name: "Email",
        tags: &[
            ("DateReceived", 0x020F),
            ("DisplayTo", 0x0211),
            ("Importance", 0x0212),
            ("MessageClass", 0x0213),
            ("Subject", 0x0214),
            ("Read", 0x0215),
            ("To", 0x0216),
            ("Cc", 0x0217),
            ("From", 0x0218),
            ("ReplyTo", 0x0219),
            ("AllDayEvent", 0x021A),
            ("Categories", 0x021B),
            ("Category", 0x021C),
            ("DTStamp", 0x021D),
            ("EndTime", 0x021E),
            ("InstanceType", 0x021F),
            ("BusyStatus", 0x0220),
            ("Location", 0x0221),
            ("MeetingRequest", 0x0222),
            ("Organizer", 0x0223),
            ("RecurrenceId", 0x0224),
            ("Reminder", 0x0225),
            ("ResponseRequested", 0x0226),
            ("Recurrences", 0x0227),
            ("Recurrence", 0x0228),
            ("Recurrence_Type", 0x0229),
            ("Recurrence_Until", 0x022A),
            ("Recurrence_Occurrences", 0x022B),
            ("Recurrence_Interval", 0x022C),
            ("Recurrence_DayOfWeek", 0x022D),
            ("Recurrence_DayOfMonth", 0x022E),
            ("Recurrence_WeekOfMonth", 0x022F),
            ("Recurrence_MonthOfYear", 0x0230),
            ("StartTime", 0x0231),
            ("Sensitivity", 0x0232),
            ("TimeZone", 0x0233),
            ("GlobalObjId", 0x0234),
            ("ThreadTopic", 0x0235),
            ("InternetCPID", 0x0239),
            ("Flag", 0x023A),
            ("Status", 0x023B),
            ("ContentClass", 0x023C),
            ("FlagType", 0x023D),
            ("CompleteTime", 0x023E),
            ("DisallowNewTimeProposal", 0x023F),
        ],
    },
    Codepage {
        name: "Move",
        tags: &[
            ("MoveItems", 0x0505),
            ("Move", 0x0506),
            ("SrcMsgId", 0x0507),
            ("SrcFldId", 0x0508),
            ("DstFldId", 0x0509),
            ("Response", 0x050A),
            ("Status", 0x050B),
            ("DstMsgId", 0x050C),
        ],
    },
    Codepage {
        name: "GetItemEstimate",
        tags: &[
            ("GetItemEstimate", 0x0605),
            ("Version", 0x0606),
            ("Collections", 0x0607),
            ("Collection", 0x0608),
            ("Class", 0x0609),
            ("CollectionId", 0x060A),
            ("DateTime", 0x060B),
            ("Estimate", 0x060C),
            ("Response", 0x060D),
            ("Status", 0x060E),
        ],
    },
    Codepage {
        name: "FolderHierarchy",
        tags: &[
            ("DisplayName", 0x0707),
            ("ServerId", 0x0708),
            ("ParentId", 0x0709),
            ("Type", 0x070A),
            ("Status", 0x070C),
            ("Changes", 0x070E),
            ("Add", 0x070F),
            ("Delete", 0x0710),
            ("Update", 0x0711),
            ("SyncKey", 0x0712),
            ("FolderCreate", 0x0713),
            ("FolderDelete", 0x0714),
            ("FolderUpdate", 0x0715),
            ("FolderSync", 0x0716),
            ("Count", 0x0717),
        ],
    },
    Codepage {
        name: "Ping",
        tags: &[
            ("Ping", 0x0D05),
            ("AutdState", 0x0D06),
            ("Status", 0x0D07),
            ("HeartbeatInterval", 0x0D08),
            ("Folders", 0x0D09),
            ("Folder", 0x0D0A),
            ("Id", 0x0D0B),
            ("Class", 0x0D0C),
            ("MaxFolders", 0x0D0D),
        ],
    },
    Codepage {
        name: "Provision",
        tags: &[
            ("Provision", 0x0E05),
            ("Policies", 0x0E06),
            ("Policy", 0x0E07),
            ("PolicyType", 0x0E08),
            ("PolicyKey", 0x0E09),
            ("Data", 0x0E0A),
            ("Status", 0x0E0B),
            ("RemoteWipe", 0x0E0C),
            ("EASProvisionDoc", 0x0E0D),
        ],
    },
    Codepage {
        name: "AirSyncBase",
        tags: &[
            ("BodyPreference", 0x1105),
            ("Type", 0x1106),
            ("TruncationSize", 0x1107),
            ("AllOrNone", 0x1108),
            ("Body", 0x110A),
            ("Data", 0x110B),
            ("EstimatedDataSize", 0x110C),
            ("Truncated", 0x110D),
            ("Attachments", 0x110E),
            ("Attachment", 0x110F),
            ("DisplayName", 0x1110),
            ("FileReference", 0x1111),
            ("Method", 0x1112),
            ("ContentId", 0x1113),
            ("ContentLocation", 0x1114),
            ("IsInline", 0x1115),
            ("NativeBodyType", 0x1116),
            ("ContentType", 0x1117),
            ("Preview", 0x1118),
            ("BodyPartPreference", 0x1119),
            ("BodyPart", 0x111A),
            ("Status", 0x111B),
        ],
    },
    Codepage {
        name: "ComposeMail",
        tags: &[
            ("SendMail", 0x1505),
            ("SmartForward", 0x1506),
            ("SmartReply", 0x1507),
            ("SaveInSentItems", 0x1508),
            ("ReplaceMime", 0x1509),
            ("Source", 0x150B),
            ("FolderId", 0x150C),
            ("ItemId", 0x150D),
            ("LongId", 0x150E),
            ("InstanceId", 0x150F),
            ("Mime", 0x1510),
            ("ClientId", 0x1511),
            ("Status", 0x1512),
            ("AccountId", 0x1513),
        ],
    },
];
